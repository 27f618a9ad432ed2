//! Error types for bmpfx.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bmpfx operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while filtering a batch of bitmaps.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error without path context.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// I/O error tied to a specific file or directory.
    #[error("I/O error for '{}': {source}", .path.display())]
    IoAt { path: PathBuf, source: io::Error },
    /// File not found.
    #[error("File not found: '{}'", .path.display())]
    NotFound { path: PathBuf },
    /// Permission denied.
    #[error("Permission denied: '{}'", .path.display())]
    PermissionDenied { path: PathBuf },
    /// Structurally broken bitmap.
    #[error("Invalid bitmap '{}': {reason}", .path.display())]
    InvalidImage { path: PathBuf, reason: String },
    /// Bitmap variant other than 24-bit uncompressed.
    #[error(
        "Unsupported bitmap '{}': only 24-bit uncompressed images are accepted \
         (bpp={bits_per_pixel}, compression={compression})",
        .path.display()
    )]
    UnsupportedFormat {
        path: PathBuf,
        bits_per_pixel: u16,
        compression: u32,
    },
    /// Argument present but unusable.
    #[error("Invalid argument '{argument}': {reason}")]
    InvalidArgument { argument: String, reason: String },
    /// Required argument absent.
    #[error("Missing required argument: {argument}")]
    MissingArgument { argument: String },
    /// Malformed or unexpected inter-process message.
    #[error("Protocol error: {reason}")]
    Protocol { reason: String },
    /// The worker thread pool could not be started.
    #[error("Failed to start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    /// A worker process ended without reporting its result.
    #[error("Worker rank {rank} failed: {reason}")]
    WorkerFailed { rank: usize, reason: String },
}

impl Error {
    /// Create an I/O error with path context.
    pub fn io_with_path(err: io::Error, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound { path },
            io::ErrorKind::PermissionDenied => Error::PermissionDenied { path },
            _ => Error::IoAt { path, source: err },
        }
    }

    /// Create an invalid image error.
    pub fn invalid_image(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidImage {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a protocol error.
    pub fn protocol(reason: impl Into<String>) -> Self {
        Error::Protocol {
            reason: reason.into(),
        }
    }

    /// Whether this error rejects the bitmap variant rather than failing I/O.
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, Error::UnsupportedFormat { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let err = Error::Io(io::Error::other("test error"));
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_io_error_with_path_display() {
        let err = Error::io_with_path(io::Error::other("disk full"), "/out/lena_gray.bmp");
        assert!(err.to_string().contains("/out/lena_gray.bmp"));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_invalid_image_display() {
        let err = Error::invalid_image("/img/a.bmp", "truncated DIB header");
        assert!(err.to_string().contains("Invalid bitmap"));
        assert!(err.to_string().contains("truncated DIB header"));
    }

    #[test]
    fn test_unsupported_format_display() {
        let err = Error::UnsupportedFormat {
            path: PathBuf::from("/img/palette.bmp"),
            bits_per_pixel: 8,
            compression: 0,
        };
        assert!(err.to_string().contains("bpp=8"));
        assert!(err.is_unsupported_format());
    }

    #[test]
    fn test_from_io_error() {
        let err: Error = io::Error::other("test").into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_io_with_path_not_found() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "not found");
        let err = Error::io_with_path(io_err, "/test/path");
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_io_with_path_permission_denied() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = Error::io_with_path(io_err, "/test/path");
        assert!(matches!(err, Error::PermissionDenied { .. }));
    }
}
