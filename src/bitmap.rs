//! 24-bit uncompressed BMP codec.
//!
//! A bitmap file is laid out as:
//! - 14 bytes: file header (`BM`, file size, reserved, pixel-array offset at byte 10)
//! - N bytes: DIB header, whose own size is the first little-endian u32 (byte 14)
//! - optional colour table / gap up to the pixel-array offset
//! - pixel array: rows of B,G,R triplets, each row padded to a multiple of 4 bytes
//!
//! Everything before the pixel array is kept as an opaque byte block and written
//! back verbatim, so only pixel content ever changes between input and output.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

/// Length of the fixed file header.
pub const FILE_HEADER_LEN: usize = 14;

/// Length of a file header plus a `BITMAPINFOHEADER`.
pub const INFO_HEADER_FILE_LEN: usize = 54;

/// Bytes per pixel in the only supported layout.
pub const BYTES_PER_PIXEL: usize = 3;

/// Smallest DIB header carrying the fields we decode (`BITMAPINFOHEADER`).
const MIN_DIB_HEADER_LEN: u32 = 40;

/// Largest DIB header defined by the format (`BITMAPV5HEADER`).
const MAX_DIB_HEADER_LEN: u32 = 124;

const SUPPORTED_BPP: u16 = 24;

/// `BI_RGB`: no compression.
const BI_RGB: u32 = 0;

/// Field offsets from the start of the file.
mod offset {
    pub const PIXEL_OFFSET: usize = 10;
    pub const DIB_SIZE: usize = 14;
    pub const WIDTH: usize = 18;
    pub const HEIGHT: usize = 22;
    pub const BITS_PER_PIXEL: usize = 28;
    pub const COMPRESSION: usize = 30;
}

/// Bytes per stored row for a given pixel width, padded to 4 bytes.
pub fn row_stride(width: usize) -> usize {
    (width * BYTES_PER_PIXEL + 3) & !3
}

fn read_u16_le(buf: &[u8], at: usize) -> Option<u16> {
    buf.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32_le(buf: &[u8], at: usize) -> Option<u32> {
    buf.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_i32_le(buf: &[u8], at: usize) -> Option<i32> {
    read_u32_le(buf, at).map(|v| v as i32)
}

fn field<T>(value: Option<T>, name: &str, path: &Path) -> Result<T> {
    value.ok_or_else(|| Error::invalid_image(path, format!("header too short for {name}")))
}

fn check_signature(header: &[u8], path: &Path) -> Result<()> {
    if header.get(..2) != Some(b"BM".as_slice()) {
        return Err(Error::invalid_image(path, "missing 'BM' signature"));
    }
    Ok(())
}

/// Decoded header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapInfo {
    /// Offset of the pixel array from the start of the file.
    pub pixel_offset: u32,
    /// Size of the DIB header.
    pub dib_size: u32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels; negative for top-down storage.
    pub height: i32,
    pub bits_per_pixel: u16,
    pub compression: u32,
}

impl BitmapInfo {
    /// Decode the header fields from the file header plus DIB header.
    ///
    /// Fails with `InvalidImage` when the buffer is too short for any field.
    pub fn parse(header: &[u8], path: &Path) -> Result<Self> {
        check_signature(header, path)?;

        Ok(Self {
            pixel_offset: field(read_u32_le(header, offset::PIXEL_OFFSET), "pixel offset", path)?,
            dib_size: field(read_u32_le(header, offset::DIB_SIZE), "DIB header size", path)?,
            width: field(read_i32_le(header, offset::WIDTH), "width", path)?,
            height: field(read_i32_le(header, offset::HEIGHT), "height", path)?,
            bits_per_pixel: field(
                read_u16_le(header, offset::BITS_PER_PIXEL),
                "bits per pixel",
                path,
            )?,
            compression: field(read_u32_le(header, offset::COMPRESSION), "compression", path)?,
        })
    }

    /// Fail with `UnsupportedFormat` unless this is 24-bit `BI_RGB`.
    pub fn ensure_supported(&self, path: &Path) -> Result<()> {
        if self.bits_per_pixel != SUPPORTED_BPP || self.compression != BI_RGB {
            return Err(Error::UnsupportedFormat {
                path: path.to_path_buf(),
                bits_per_pixel: self.bits_per_pixel,
                compression: self.compression,
            });
        }
        Ok(())
    }

    /// Number of stored rows.
    pub fn rows(&self) -> usize {
        self.height.unsigned_abs() as usize
    }
}

/// An in-memory 24-bit bitmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    header: Vec<u8>,
    info: BitmapInfo,
    width: usize,
    height: usize,
    stride: usize,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Read and validate a bitmap from disk.
    pub fn read(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::io_with_path(e, path))?;
        Self::from_reader(BufReader::new(file), path)
    }

    /// Decode a bitmap held in memory. `path` is only used for error context.
    pub fn from_bytes(data: &[u8], path: &Path) -> Result<Self> {
        Self::from_reader(Cursor::new(data), path)
    }

    /// Decode a bitmap from any byte stream.
    ///
    /// The format is rejected before the pixel buffer is allocated.
    pub fn from_reader<R: Read>(mut reader: R, path: &Path) -> Result<Self> {
        let mut header = vec![0u8; FILE_HEADER_LEN + 4];
        read_section(&mut reader, &mut header, path, "file header")?;
        check_signature(&header, path)?;

        let dib_size = read_u32_le(&header, offset::DIB_SIZE).unwrap_or_default();
        if !(MIN_DIB_HEADER_LEN..=MAX_DIB_HEADER_LEN).contains(&dib_size) {
            return Err(Error::invalid_image(
                path,
                format!("unsupported DIB header size {dib_size}"),
            ));
        }

        let header_len = FILE_HEADER_LEN + dib_size as usize;
        header.resize(header_len, 0);
        read_section(&mut reader, &mut header[FILE_HEADER_LEN + 4..], path, "DIB header")?;

        let info = BitmapInfo::parse(&header, path)?;
        info.ensure_supported(path)?;

        if info.width < 0 {
            return Err(Error::invalid_image(path, "negative width"));
        }
        let pixel_offset = info.pixel_offset as usize;
        if pixel_offset < header_len {
            return Err(Error::invalid_image(
                path,
                format!("pixel offset {pixel_offset} lies inside the {header_len}-byte header"),
            ));
        }

        // Colour table or gap between the DIB header and the pixels.
        let gap = (pixel_offset - header_len) as u64;
        read_exact_len(&mut reader, gap, &mut header, path, "colour table")?;

        let width = info.width as usize;
        let height = info.rows();
        let stride = row_stride(width);
        let pixel_len = stride
            .checked_mul(height)
            .ok_or_else(|| Error::invalid_image(path, "pixel array size overflows"))?;

        let mut pixels = Vec::new();
        read_exact_len(&mut reader, pixel_len as u64, &mut pixels, path, "pixel array")?;

        Ok(Self {
            header,
            info,
            width,
            height,
            stride,
            pixels,
        })
    }

    /// Build a bitmap with a fresh 54-byte header around the given pixel rows.
    ///
    /// `pixels` must hold `row_stride(width) * height` bytes, bottom-up.
    pub fn with_pixels(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let stride = row_stride(width as usize);
        let expected = stride * height as usize;
        if pixels.len() != expected {
            return Err(Error::InvalidArgument {
                argument: String::from("pixels"),
                reason: format!("expected {expected} bytes, got {}", pixels.len()),
            });
        }

        let file_size = (INFO_HEADER_FILE_LEN + expected) as u32;
        let mut header = Vec::with_capacity(INFO_HEADER_FILE_LEN);
        header.extend_from_slice(b"BM");
        header.extend_from_slice(&file_size.to_le_bytes());
        header.extend_from_slice(&[0; 4]);
        header.extend_from_slice(&(INFO_HEADER_FILE_LEN as u32).to_le_bytes());
        header.extend_from_slice(&MIN_DIB_HEADER_LEN.to_le_bytes());
        header.extend_from_slice(&(width as i32).to_le_bytes());
        header.extend_from_slice(&(height as i32).to_le_bytes());
        header.extend_from_slice(&1u16.to_le_bytes());
        header.extend_from_slice(&SUPPORTED_BPP.to_le_bytes());
        header.extend_from_slice(&BI_RGB.to_le_bytes());
        header.extend_from_slice(&(expected as u32).to_le_bytes());
        // 2835 px/m = 72 dpi.
        header.extend_from_slice(&2835i32.to_le_bytes());
        header.extend_from_slice(&2835i32.to_le_bytes());
        header.extend_from_slice(&[0; 8]);

        let info = BitmapInfo::parse(&header, Path::new("<memory>"))?;
        Ok(Self {
            header,
            info,
            width: width as usize,
            height: height as usize,
            stride,
            pixels,
        })
    }

    /// Write header and pixel buffer to disk.
    pub fn write(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::io_with_path(e, path))?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)
            .and_then(|()| writer.flush())
            .map_err(|e| Error::io_with_path(e, path))
    }

    /// Emit the header verbatim followed by the pixel buffer, padding included.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.header)?;
        writer.write_all(&self.pixels)
    }

    /// Encode into a fresh byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header.len() + self.pixels.len());
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&self.pixels);
        out
    }

    pub fn info(&self) -> &BitmapInfo {
        &self.info
    }

    /// All bytes preceding the pixel array.
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of stored rows.
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn row_stride(&self) -> usize {
        self.stride
    }

    /// Pixel bytes per row, padding excluded.
    pub fn row_bytes(&self) -> usize {
        self.width * BYTES_PER_PIXEL
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    /// The B,G,R triplet at (`x`, stored row `y`).
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let at = y * self.stride + x * BYTES_PER_PIXEL;
        [self.pixels[at], self.pixels[at + 1], self.pixels[at + 2]]
    }
}

/// Fill `buf` completely, reporting a short stream as a truncated image.
fn read_section<R: Read>(reader: &mut R, buf: &mut [u8], path: &Path, what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::invalid_image(path, format!("truncated {what}")),
        _ => Error::io_with_path(e, path),
    })
}

/// Append exactly `len` bytes to `out`, growing it only as data arrives.
fn read_exact_len<R: Read>(
    reader: &mut R,
    len: u64,
    out: &mut Vec<u8>,
    path: &Path,
    what: &str,
) -> Result<()> {
    let before = out.len();
    reader
        .take(len)
        .read_to_end(out)
        .map_err(|e| Error::io_with_path(e, path))?;
    if ((out.len() - before) as u64) < len {
        return Err(Error::invalid_image(
            path,
            format!("truncated {what}: expected {len} bytes, got {}", out.len() - before),
        ));
    }
    Ok(())
}
