//! Command-line configuration for bmpfx.

use crate::distribute::{MAX_IMAGES, available_parallelism};
use crate::error::{Error, Result};
use crate::filters::{DEFAULT_KERNEL_SIZE, validate_kernel_size};
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::warn;

/// Application name.
pub const NAME: &str = "bmpfx";

/// Run configuration, shared by the coordinator and every worker.
#[derive(Debug, Clone, Parser)]
#[command(
    name = NAME,
    version,
    about = "Apply grayscale, mirror and blur filters to a directory of 24-bit bitmaps",
    after_help = "Invalid or missing KERNEL_SIZE values fall back to 105."
)]
pub struct Config {
    /// Blur kernel size: an odd integer in 55..=155
    #[arg(value_name = "KERNEL_SIZE", allow_negative_numbers = true)]
    pub kernel_size: Option<String>,

    /// Directory scanned for .bmp files
    #[arg(short, long, value_name = "DIR", default_value = "img")]
    pub input_dir: PathBuf,

    /// Directory receiving the filtered images
    #[arg(short, long, value_name = "DIR", default_value = "out")]
    pub output_dir: PathBuf,

    /// Directory receiving per-operation metric records
    #[arg(short, long, value_name = "DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// Path of the global report
    #[arg(short, long, value_name = "FILE", default_value = "report_total.txt")]
    pub report: PathBuf,

    /// Worker threads per process (default: available CPU cores)
    #[arg(short = 'j', long, value_name = "N", env = "BMPFX_THREADS", value_parser = parse_count)]
    pub threads: Option<usize>,

    /// Number of cooperating processes
    #[arg(
        short,
        long,
        value_name = "N",
        env = "BMPFX_PROCESSES",
        default_value_t = 1,
        value_parser = parse_count
    )]
    pub processes: usize,

    /// Maximum number of images taken from the input directory
    #[arg(long, value_name = "N", default_value_t = MAX_IMAGES, value_parser = parse_count)]
    pub max_images: usize,

    /// Rank of a worker process; set by the coordinator when it launches workers
    #[arg(long, hide = true)]
    pub rank: Option<usize>,
}

impl Config {
    /// Parse configuration from command-line arguments.
    pub fn parse_from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString> + Clone,
    {
        Self::try_parse_from(args).map_err(|e| Error::InvalidArgument {
            argument: String::from("command line"),
            reason: e.to_string(),
        })
    }

    /// Worker threads to start in this process.
    pub fn threads(&self) -> usize {
        self.threads.unwrap_or_else(available_parallelism)
    }

    /// Validated kernel size, or the default when the input is missing or invalid.
    pub fn resolve_kernel_size(&self) -> u32 {
        match validate_kernel_size(self.kernel_size.as_deref()) {
            Ok(size) => size,
            Err(e) => {
                warn!(error = %e, default = DEFAULT_KERNEL_SIZE, "using default kernel size");
                DEFAULT_KERNEL_SIZE
            }
        }
    }

    /// Arguments handed to a worker process, `--rank` excluded.
    ///
    /// The kernel size is not among them: workers receive it by broadcast.
    pub fn worker_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        let mut push = |flag: &str, value: OsString| {
            args.push(OsString::from(flag));
            args.push(value);
        };
        push("--input-dir", self.input_dir.clone().into_os_string());
        push("--output-dir", self.output_dir.clone().into_os_string());
        push("--log-dir", self.log_dir.clone().into_os_string());
        push("--report", self.report.clone().into_os_string());
        push("--threads", self.threads().to_string().into());
        push("--processes", self.processes.to_string().into());
        push("--max-images", self.max_images.to_string().into());
        args
    }
}

/// Parse a positive count.
fn parse_count(value: &str) -> std::result::Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err(String::from("must be at least 1")),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{}' is not a valid number", value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let config = Config::parse_from_args(["bmpfx"]).unwrap();
        assert_eq!(config.kernel_size, None);
        assert_eq!(config.input_dir, PathBuf::from("img"));
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.report, PathBuf::from("report_total.txt"));
        assert_eq!(config.max_images, MAX_IMAGES);
        assert_eq!(config.rank, None);
        assert!(config.threads() >= 1);
    }

    #[test]
    fn test_parse_kernel_size() {
        let config = Config::parse_from_args(["bmpfx", "77"]).unwrap();
        assert_eq!(config.resolve_kernel_size(), 77);
    }

    #[test]
    fn test_invalid_kernel_falls_back() {
        for raw in ["54", "156", "100", "abc", "-7"] {
            let config = Config::parse_from_args(["bmpfx", raw]).unwrap();
            assert_eq!(config.resolve_kernel_size(), DEFAULT_KERNEL_SIZE, "{raw}");
        }
        let config = Config::parse_from_args(["bmpfx"]).unwrap();
        assert_eq!(config.resolve_kernel_size(), DEFAULT_KERNEL_SIZE);
    }

    #[test]
    fn test_parse_directories() {
        let config = Config::parse_from_args([
            "bmpfx",
            "-i",
            "in",
            "--output-dir",
            "dst",
            "-l",
            "l",
            "-r",
            "r.txt",
            "55",
        ])
        .unwrap();
        assert_eq!(config.input_dir, PathBuf::from("in"));
        assert_eq!(config.output_dir, PathBuf::from("dst"));
        assert_eq!(config.log_dir, PathBuf::from("l"));
        assert_eq!(config.report, PathBuf::from("r.txt"));
        assert_eq!(config.kernel_size.as_deref(), Some("55"));
    }

    #[test]
    fn test_parse_threads() {
        let config = Config::parse_from_args(["bmpfx", "-j", "4"]).unwrap();
        assert_eq!(config.threads(), 4);
        let config = Config::parse_from_args(["bmpfx", "--threads=12"]).unwrap();
        assert_eq!(config.threads(), 12);
    }

    #[test]
    fn test_parse_threads_invalid() {
        assert!(Config::parse_from_args(["bmpfx", "-j", "0"]).is_err());
        assert!(Config::parse_from_args(["bmpfx", "-j", "abc"]).is_err());
        assert!(Config::parse_from_args(["bmpfx", "-j"]).is_err());
    }

    #[test]
    fn test_parse_processes_and_rank() {
        let config = Config::parse_from_args(["bmpfx", "-p", "3", "--rank", "2"]).unwrap();
        assert_eq!(config.processes, 3);
        assert_eq!(config.rank, Some(2));
        assert!(Config::parse_from_args(["bmpfx", "-p", "0"]).is_err());
    }

    #[test]
    fn test_unknown_option() {
        assert!(Config::parse_from_args(["bmpfx", "--unknown"]).is_err());
    }

    #[test]
    fn test_worker_args_round_trip() {
        let config = Config::parse_from_args([
            "bmpfx", "-i", "a", "-o", "b", "-j", "3", "-p", "2", "99",
        ])
        .unwrap();
        let mut args = vec![OsString::from("bmpfx")];
        args.extend(config.worker_args());
        args.extend([OsString::from("--rank"), OsString::from("1")]);

        let worker = Config::parse_from_args(args).unwrap();
        assert_eq!(worker.input_dir, config.input_dir);
        assert_eq!(worker.output_dir, config.output_dir);
        assert_eq!(worker.threads(), 3);
        assert_eq!(worker.processes, 2);
        assert_eq!(worker.rank, Some(1));
        assert_eq!(worker.kernel_size, None);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("8"), Ok(8));
        assert!(parse_count("0").is_err());
        assert!(parse_count("-1").is_err());
    }
}
