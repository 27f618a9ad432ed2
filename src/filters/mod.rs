//! In-memory pixel kernels and the per-image operation set.
//!
//! Kernels are pure transforms over a decoded [`Bitmap`]: they never touch the
//! header and never perform I/O. Each reports its logical byte traffic so the
//! metrics layer can derive throughput figures.

pub mod blur;
pub mod grayscale;
pub mod mirror;

use crate::bitmap::Bitmap;

pub use blur::{DEFAULT_KERNEL_SIZE, KERNEL_SIZE_RANGE, box_blur, validate_kernel_size};
pub use grayscale::{grayscale, luma};
pub use mirror::{mirror_horizontal, mirror_vertical};

/// Logical byte reads and writes performed by one kernel invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Traffic {
    pub reads: u64,
    pub writes: u64,
}

impl Traffic {
    /// Equal read and write counts.
    pub fn symmetric(bytes: u64) -> Self {
        Self {
            reads: bytes,
            writes: bytes,
        }
    }

    /// Total bytes moved.
    pub fn total(&self) -> u64 {
        self.reads + self.writes
    }
}

/// A single kernel, the unit that is timed and recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Grayscale,
    MirrorHorizontal,
    MirrorVertical,
    Blur { kernel_size: u32 },
}

impl Stage {
    /// Tag used in record files.
    pub fn tag(&self) -> &'static str {
        match self {
            Stage::Grayscale => "grayscale",
            Stage::MirrorHorizontal => "mirror_horizontal",
            Stage::MirrorVertical => "mirror_vertical",
            Stage::Blur { .. } => "blur",
        }
    }

    /// Run the kernel on `image` in place.
    pub fn apply(&self, image: &mut Bitmap) -> Traffic {
        match *self {
            Stage::Grayscale => grayscale(image),
            Stage::MirrorHorizontal => mirror_horizontal(image),
            Stage::MirrorVertical => mirror_vertical(image),
            Stage::Blur { kernel_size } => box_blur(image, kernel_size),
        }
    }
}

/// The six outputs produced for every input image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Grayscale,
    MirrorHorizontalColor,
    MirrorVerticalColor,
    MirrorHorizontalGray,
    MirrorVerticalGray,
    Blur,
}

impl Operation {
    /// Pipeline order for one image.
    pub const ALL: [Operation; 6] = [
        Operation::Grayscale,
        Operation::MirrorHorizontalColor,
        Operation::MirrorVerticalColor,
        Operation::MirrorHorizontalGray,
        Operation::MirrorVerticalGray,
        Operation::Blur,
    ];

    /// Suffix used in output and record file names.
    pub fn tag(&self) -> &'static str {
        match self {
            Operation::Grayscale => "gray",
            Operation::MirrorHorizontalColor => "hinv_color",
            Operation::MirrorVerticalColor => "vinv_color",
            Operation::MirrorHorizontalGray => "hinv_gray",
            Operation::MirrorVerticalGray => "vinv_gray",
            Operation::Blur => "blur",
        }
    }

    /// Human-readable name for progress lines.
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Grayscale => "Grayscale",
            Operation::MirrorHorizontalColor => "Horizontal mirror (color)",
            Operation::MirrorVerticalColor => "Vertical mirror (color)",
            Operation::MirrorHorizontalGray => "Horizontal mirror (gray)",
            Operation::MirrorVerticalGray => "Vertical mirror (gray)",
            Operation::Blur => "Blur",
        }
    }

    /// Kernels in application order. Composites run grayscale first.
    pub fn stages(&self, kernel_size: u32) -> Vec<Stage> {
        match self {
            Operation::Grayscale => vec![Stage::Grayscale],
            Operation::MirrorHorizontalColor => vec![Stage::MirrorHorizontal],
            Operation::MirrorVerticalColor => vec![Stage::MirrorVertical],
            Operation::MirrorHorizontalGray => vec![Stage::Grayscale, Stage::MirrorHorizontal],
            Operation::MirrorVerticalGray => vec![Stage::Grayscale, Stage::MirrorVertical],
            Operation::Blur => vec![Stage::Blur { kernel_size }],
        }
    }

    /// Output file name for image `base`.
    pub fn output_file_name(&self, base: &str, kernel_size: u32) -> String {
        match self {
            Operation::Blur => format!("{}_{}_{}.bmp", base, self.tag(), kernel_size),
            _ => format!("{}_{}.bmp", base, self.tag()),
        }
    }
}
