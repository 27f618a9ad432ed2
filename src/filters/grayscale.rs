//! Luma-weighted grayscale conversion.

use super::Traffic;
use crate::bitmap::{BYTES_PER_PIXEL, Bitmap};

const RED_WEIGHT: f64 = 0.21;
const GREEN_WEIGHT: f64 = 0.72;
const BLUE_WEIGHT: f64 = 0.07;

/// Gray level for one pixel, truncated toward zero.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    (RED_WEIGHT * f64::from(r) + GREEN_WEIGHT * f64::from(g) + BLUE_WEIGHT * f64::from(b)) as u8
}

/// Replace every pixel with its gray level on all three channels.
///
/// Row padding is neither read nor written.
pub fn grayscale(image: &mut Bitmap) -> Traffic {
    let stride = image.row_stride();
    let row_bytes = image.row_bytes();
    if stride == 0 {
        return Traffic::default();
    }

    for row in image.pixels_mut().chunks_exact_mut(stride) {
        for px in row[..row_bytes].chunks_exact_mut(BYTES_PER_PIXEL) {
            let gray = luma(px[2], px[1], px[0]);
            px.fill(gray);
        }
    }

    Traffic::symmetric((image.width() * image.height() * BYTES_PER_PIXEL) as u64)
}
