//! Horizontal and vertical mirroring.

use super::Traffic;
use crate::bitmap::{BYTES_PER_PIXEL, Bitmap};

/// Reverse the pixel order of every row; padding stays where it is.
///
/// Each row is assembled in a scratch buffer because source and destination
/// columns overlap.
pub fn mirror_horizontal(image: &mut Bitmap) -> Traffic {
    let stride = image.row_stride();
    let row_bytes = image.row_bytes();
    let width = image.width();
    if stride == 0 {
        return Traffic::default();
    }

    let mut scratch = vec![0u8; stride];
    for row in image.pixels_mut().chunks_exact_mut(stride) {
        for (x, src) in row[..row_bytes].chunks_exact(BYTES_PER_PIXEL).enumerate() {
            let dst = (width - 1 - x) * BYTES_PER_PIXEL;
            scratch[dst..dst + BYTES_PER_PIXEL].copy_from_slice(src);
        }
        scratch[row_bytes..].copy_from_slice(&row[row_bytes..]);
        row.copy_from_slice(&scratch);
    }

    Traffic::symmetric((width * image.height() * BYTES_PER_PIXEL) as u64)
}

/// Reverse the stored row order, moving whole padded rows.
///
/// Traffic is the full buffer size in each direction, since every row moves as
/// one block.
pub fn mirror_vertical(image: &mut Bitmap) -> Traffic {
    let stride = image.row_stride();
    let height = image.height();
    let pixels = image.pixels_mut();

    for y in 0..height / 2 {
        let (upper, lower) = pixels.split_at_mut((height - 1 - y) * stride);
        upper[y * stride..(y + 1) * stride].swap_with_slice(&mut lower[..stride]);
    }

    Traffic::symmetric(pixels.len() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmap::row_stride;

    fn numbered(width: u32, height: u32) -> Bitmap {
        let len = row_stride(width as usize) * height as usize;
        Bitmap::with_pixels(width, height, (0..len).map(|i| i as u8).collect()).unwrap()
    }

    #[test]
    fn test_mirror_horizontal_reverses_columns() {
        let original = numbered(3, 2);
        let mut image = original.clone();
        let traffic = mirror_horizontal(&mut image);

        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(image.pixel(x, y), original.pixel(2 - x, y));
            }
        }
        assert_eq!(traffic, Traffic { reads: 18, writes: 18 });
    }

    #[test]
    fn test_mirror_horizontal_keeps_padding() {
        let original = numbered(10, 2);
        let mut image = original.clone();
        mirror_horizontal(&mut image);
        for y in 0..2 {
            let row = y * 32;
            assert_eq!(image.pixels()[row + 30..row + 32], original.pixels()[row + 30..row + 32]);
        }
    }

    #[test]
    fn test_mirror_horizontal_twice_is_identity() {
        let original = numbered(5, 4);
        let mut image = original.clone();
        mirror_horizontal(&mut image);
        assert_ne!(image, original);
        mirror_horizontal(&mut image);
        assert_eq!(image, original);
    }

    #[test]
    fn test_mirror_vertical_reverses_rows() {
        let original = numbered(2, 3);
        let mut image = original.clone();
        let traffic = mirror_vertical(&mut image);

        let stride = image.row_stride();
        for y in 0..3 {
            let src = (2 - y) * stride;
            assert_eq!(
                image.pixels()[y * stride..(y + 1) * stride],
                original.pixels()[src..src + stride]
            );
        }
        // Whole buffer counted, padding included.
        assert_eq!(traffic, Traffic { reads: 24, writes: 24 });
    }

    #[test]
    fn test_mirror_vertical_twice_is_identity() {
        let original = numbered(4, 5);
        let mut image = original.clone();
        mirror_vertical(&mut image);
        assert_ne!(image, original);
        mirror_vertical(&mut image);
        assert_eq!(image, original);
    }

    #[test]
    fn test_mirror_single_row_and_column() {
        let original = numbered(1, 1);
        let mut image = original.clone();
        mirror_vertical(&mut image);
        mirror_horizontal(&mut image);
        assert_eq!(image, original);
    }
}
