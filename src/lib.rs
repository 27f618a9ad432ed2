//! bmpfx - parallel filters for 24-bit bitmaps
//!
//! Reads every `.bmp` in an input directory and writes six outputs per image:
//! grayscale, horizontal and vertical mirrors in color and in gray, and a
//! separable box blur. Every kernel invocation is timed and recorded, and the
//! records are aggregated into one global throughput report.
//!
//! # Parallelism
//!
//! - Processes: rank 0 re-executes the binary once per extra rank and
//!   exchanges JSON lines with each worker over its stdin/stdout
//! - Threads: each process runs its share on a fixed-size rayon pool
//!
//! # Example
//!
//! ```no_run
//! use bmpfx::cli::Config;
//! use bmpfx::driver::run_coordinator;
//!
//! let config = Config::parse_from_args(["bmpfx", "--input-dir", "img", "77"]).unwrap();
//! let summary = run_coordinator(&config).unwrap();
//! println!("{} images, {:.6} MIPS", summary.images, summary.report.mips());
//! ```

pub mod bitmap;
pub mod cli;
pub mod cluster;
pub mod distribute;
pub mod driver;
pub mod error;
pub mod filters;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod report;
pub mod terminal;

pub use bitmap::Bitmap;
pub use cli::Config;
pub use error::{Error, Result};
pub use filters::{Operation, Stage, Traffic};
pub use processor::Processor;
pub use report::GlobalReport;
