//! Separable box blur.
//!
//! A horizontal mean pass over each channel plane is followed by a vertical
//! mean pass over its output. Windows are clipped at the image border and the
//! divisor shrinks with them: no wraparound, no reflection.

use super::Traffic;
use crate::bitmap::{BYTES_PER_PIXEL, Bitmap, INFO_HEADER_FILE_LEN};
use crate::error::{Error, Result};
use std::ops::RangeInclusive;

/// Kernel size substituted for missing or out-of-range input.
pub const DEFAULT_KERNEL_SIZE: u32 = 105;

/// Accepted kernel sizes (odd values only).
pub const KERNEL_SIZE_RANGE: RangeInclusive<u32> = 55..=155;

/// Header bytes counted once on each side of the blur traffic.
const HEADER_TRAFFIC: u64 = INFO_HEADER_FILE_LEN as u64;

/// Parse and validate a kernel size as supplied on the command line.
pub fn validate_kernel_size(raw: Option<&str>) -> Result<u32> {
    let raw = raw.ok_or_else(|| Error::MissingArgument {
        argument: String::from("<KERNEL_SIZE>"),
    })?;
    let invalid = |reason: String| Error::InvalidArgument {
        argument: String::from("<KERNEL_SIZE>"),
        reason,
    };

    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid(format!("'{raw}' is not an integer")))?;
    let (lo, hi) = (*KERNEL_SIZE_RANGE.start(), *KERNEL_SIZE_RANGE.end());
    if value < i64::from(lo) || value > i64::from(hi) {
        return Err(invalid(format!("{value} is outside {lo}..={hi}")));
    }
    if value % 2 == 0 {
        return Err(invalid(format!("{value} is even")));
    }
    Ok(value as u32)
}

/// Blur every channel with a `kernel_size`-wide clipped mean, in place.
///
/// Any size is accepted here; `kernel_size` 1 (radius 0) is the identity.
pub fn box_blur(image: &mut Bitmap, kernel_size: u32) -> Traffic {
    let radius = (kernel_size / 2) as usize;
    let width = image.width();
    let height = image.height();
    let stride = image.row_stride();
    let traffic = Traffic::symmetric(HEADER_TRAFFIC + (stride * height) as u64);
    if width == 0 || height == 0 {
        return traffic;
    }

    let mut prefix = Vec::with_capacity(width.max(height) + 1);

    // Padding rides along in the copies.
    let mut horizontal = image.pixels().to_vec();
    for y in 0..height {
        for channel in 0..BYTES_PER_PIXEL {
            let lane = Lane {
                start: y * stride + channel,
                step: BYTES_PER_PIXEL,
                len: width,
            };
            clipped_mean(image.pixels(), &mut horizontal, lane, radius, &mut prefix);
        }
    }

    let mut vertical = horizontal.clone();
    for x in 0..width {
        for channel in 0..BYTES_PER_PIXEL {
            let lane = Lane {
                start: x * BYTES_PER_PIXEL + channel,
                step: stride,
                len: height,
            };
            clipped_mean(&horizontal, &mut vertical, lane, radius, &mut prefix);
        }
    }

    image.pixels_mut().copy_from_slice(&vertical);
    traffic
}

/// A strided run of samples of one channel: a row or a column.
#[derive(Debug, Clone, Copy)]
struct Lane {
    start: usize,
    step: usize,
    len: usize,
}

impl Lane {
    #[inline]
    fn index(&self, i: usize) -> usize {
        self.start + i * self.step
    }
}

/// Mean of `src` over `[i - radius, i + radius]` clipped to the lane, into `dst`.
fn clipped_mean(src: &[u8], dst: &mut [u8], lane: Lane, radius: usize, prefix: &mut Vec<u64>) {
    prefix.clear();
    prefix.push(0);
    let mut acc = 0u64;
    for i in 0..lane.len {
        acc += u64::from(src[lane.index(i)]);
        prefix.push(acc);
    }

    for i in 0..lane.len {
        let lo = i.saturating_sub(radius);
        let hi = (i + radius).min(lane.len - 1);
        let count = (hi - lo + 1) as u64;
        dst[lane.index(i)] = ((prefix[hi + 1] - prefix[lo]) / count) as u8;
    }
}
