//! Per-process image pipeline.
//!
//! A [`Processor`] owns one rank's thread pool. Each worker thread claims an
//! image, decodes it once, and produces the six outputs from private copies of
//! the pixel buffer, so no two threads ever share image data.

use crate::bitmap::Bitmap;
use crate::cli::Config;
use crate::cluster::RankReport;
use crate::distribute::{WorkAssignment, WorkerPool, base_name};
use crate::error::{Error, Result};
use crate::filters::Operation;
use crate::metrics::{MetricsRecorder, OperationMetrics};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info};

/// What happened to one input image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOutcome {
    /// Image base name.
    pub image: String,
    /// Operations whose output and records were written.
    pub completed: usize,
    /// Operations that failed.
    pub failures: usize,
}

/// Runs the six-operation pipeline over one rank's share of the images.
pub struct Processor {
    rank: usize,
    kernel_size: u32,
    output_dir: PathBuf,
    recorder: MetricsRecorder,
    pool: WorkerPool,
}

impl Processor {
    /// Create a processor for `rank` with the broadcast kernel size.
    pub fn new(config: &Config, rank: usize, kernel_size: u32) -> Result<Self> {
        Ok(Self {
            rank,
            kernel_size,
            output_dir: config.output_dir.clone(),
            recorder: MetricsRecorder::new(&config.log_dir),
            pool: WorkerPool::new(config.threads())?,
        })
    }

    /// Get the number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.pool.num_threads()
    }

    /// Process this rank's share of `images` and time the whole partition.
    pub fn run(&self, images: &[PathBuf], assignment: &WorkAssignment) -> RankReport {
        let share = assignment.select(images);
        info!(
            rank = self.rank,
            images = share.len(),
            threads = self.num_threads(),
            kernel_size = self.kernel_size,
            "partition started"
        );

        let start = Instant::now();
        let outcomes = self.pool.run_claimed(&share, |path| self.process_image(path));
        let elapsed = start.elapsed();

        let failures: usize = outcomes.iter().map(|o| o.failures).sum();
        info!(
            rank = self.rank,
            elapsed_secs = elapsed.as_secs_f64(),
            failures,
            "partition finished"
        );

        RankReport {
            rank: self.rank,
            elapsed_secs: elapsed.as_secs_f64(),
            images: outcomes.len(),
            failures,
        }
    }

    /// Produce all six outputs for one image.
    ///
    /// A failing operation is logged and counted; the remaining ones still run.
    pub fn process_image(&self, path: &Path) -> ImageOutcome {
        let base = base_name(path);
        info!("rank {} processing image {}", self.rank, base);

        let mut outcome = ImageOutcome {
            image: base.clone(),
            completed: 0,
            failures: 0,
        };

        let source = match Bitmap::read(path) {
            Ok(bitmap) => bitmap,
            Err(e) => {
                log_failure(self.rank, path, &e);
                outcome.failures = Operation::ALL.len();
                return outcome;
            }
        };

        for operation in Operation::ALL {
            match self.run_operation(&source, &base, operation) {
                Ok(output) => {
                    info!("-> [{}] {}: {}", self.rank, operation.label(), output.display());
                    outcome.completed += 1;
                }
                Err(e) => {
                    error!(
                        rank = self.rank,
                        image = %base,
                        operation = operation.tag(),
                        error = %e,
                        "operation failed"
                    );
                    outcome.failures += 1;
                }
            }
        }
        outcome
    }

    /// Run one operation on a copy of `source`, write its output, then its records.
    pub fn run_operation(
        &self,
        source: &Bitmap,
        base: &str,
        operation: Operation,
    ) -> Result<PathBuf> {
        let mut image = source.clone();
        let metrics: Vec<OperationMetrics> = operation
            .stages(self.kernel_size)
            .into_iter()
            .map(|stage| {
                self.recorder.measure(base, operation, stage, || stage.apply(&mut image))
            })
            .collect();

        let output = self
            .output_dir
            .join(operation.output_file_name(base, self.kernel_size));
        image.write(&output)?;

        for m in &metrics {
            self.recorder.persist(m)?;
        }
        Ok(output)
    }
}

fn log_failure(rank: usize, path: &Path, e: &Error) {
    if e.is_unsupported_format() {
        error!(rank, image = %path.display(), error = %e, "skipping unsupported bitmap");
    } else {
        error!(rank, image = %path.display(), error = %e, "could not read image");
    }
}
