//! Per-operation throughput records.
//!
//! Every kernel invocation is timed and persisted as one small text record in
//! the log directory. Records are written once and never updated; the report
//! aggregator reads them back after all processes finish.

use crate::error::{Error, Result};
use crate::filters::{Operation, Stage, Traffic};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Synthetic instructions charged per logical byte moved.
pub const INSTRUCTIONS_PER_BYTE: u64 = 20;

/// Floor applied to elapsed times before dividing by them.
pub const MIN_ELAPSED_SECS: f64 = 1e-6;

/// Extension of record files in the log directory.
pub const RECORD_EXTENSION: &str = "txt";

const READS_LABEL: &str = "Reads:";
const WRITES_LABEL: &str = "Writes:";

/// Proxy instruction count for a byte volume.
pub fn instructions(bytes: u64) -> u64 {
    bytes * INSTRUCTIONS_PER_BYTE
}

/// Proxy MIPS for a byte volume over `elapsed_secs` (already floored).
pub fn mips(bytes: u64, elapsed_secs: f64) -> f64 {
    instructions(bytes) as f64 / (elapsed_secs * 1e6)
}

/// Bytes per second for a byte volume over `elapsed_secs` (already floored).
pub fn bytes_per_second(bytes: u64, elapsed_secs: f64) -> f64 {
    bytes as f64 / elapsed_secs
}

/// Clamp an elapsed time to [`MIN_ELAPSED_SECS`].
pub fn floor_elapsed(secs: f64) -> f64 {
    if secs <= MIN_ELAPSED_SECS {
        MIN_ELAPSED_SECS
    } else {
        secs
    }
}

/// One timed kernel invocation on one image.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationMetrics {
    /// Image base name (file name without `.bmp`).
    pub image: String,
    /// Output this stage contributed to.
    pub operation: Operation,
    /// Kernel that ran.
    pub stage: Stage,
    pub traffic: Traffic,
    /// Wall time of the kernel, floored at [`MIN_ELAPSED_SECS`].
    pub elapsed_secs: f64,
}

impl OperationMetrics {
    pub fn new(
        image: impl Into<String>,
        operation: Operation,
        stage: Stage,
        traffic: Traffic,
        elapsed: Duration,
    ) -> Self {
        Self {
            image: image.into(),
            operation,
            stage,
            traffic,
            elapsed_secs: floor_elapsed(elapsed.as_secs_f64()),
        }
    }

    pub fn instructions(&self) -> u64 {
        instructions(self.traffic.total())
    }

    pub fn mips(&self) -> f64 {
        mips(self.traffic.total(), self.elapsed_secs)
    }

    pub fn bytes_per_second(&self) -> f64 {
        bytes_per_second(self.traffic.total(), self.elapsed_secs)
    }

    /// `<base>_<operation>_<stage>.txt`; unique per (image, operation, stage).
    pub fn record_file_name(&self) -> String {
        format!(
            "{}_{}_{}.{}",
            self.image,
            self.operation.tag(),
            self.stage.tag(),
            RECORD_EXTENSION
        )
    }

    /// Render the record body.
    pub fn to_record(&self) -> String {
        format!(
            "File: {}.bmp\n\
             Operation: {}\n\
             Output: {}\n\
             {READS_LABEL} {}\n\
             {WRITES_LABEL} {}\n\
             Elapsed: {:.6}\n\
             MIPS: {:.6}\n\
             Bytes per second: {:.6}\n",
            self.image,
            self.stage.tag(),
            self.operation.tag(),
            self.traffic.reads,
            self.traffic.writes,
            self.elapsed_secs,
            self.mips(),
            self.bytes_per_second(),
        )
    }
}

/// Read/write counts carried by a record body. Unlabelled lines are ignored.
pub fn parse_record(text: &str) -> Traffic {
    let mut traffic = Traffic::default();
    for line in text.lines() {
        if let Some(n) = labelled_count(line, READS_LABEL) {
            traffic.reads += n;
        } else if let Some(n) = labelled_count(line, WRITES_LABEL) {
            traffic.writes += n;
        }
    }
    traffic
}

fn labelled_count(line: &str, label: &str) -> Option<u64> {
    line.strip_prefix(label)?.trim().parse().ok()
}

/// Times kernels and persists their records under one log directory.
#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    log_dir: PathBuf,
}

impl MetricsRecorder {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// Time `kernel`, which must return the traffic it generated.
    pub fn measure<F>(
        &self,
        image: &str,
        operation: Operation,
        stage: Stage,
        kernel: F,
    ) -> OperationMetrics
    where
        F: FnOnce() -> Traffic,
    {
        let start = Instant::now();
        let traffic = kernel();
        OperationMetrics::new(image, operation, stage, traffic, start.elapsed())
    }

    /// Write one record file, returning its path.
    pub fn persist(&self, metrics: &OperationMetrics) -> Result<PathBuf> {
        let path = self.log_dir.join(metrics.record_file_name());
        fs::write(&path, metrics.to_record()).map_err(|e| Error::io_with_path(e, &path))?;
        debug!(
            record = %path.display(),
            reads = metrics.traffic.reads,
            writes = metrics.traffic.writes,
            elapsed = metrics.elapsed_secs,
            "metrics persisted"
        );
        Ok(path)
    }

    /// Remove record files left by a previous run. Returns how many were removed.
    pub fn clear_stale(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.log_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(Error::io_with_path(e, &self.log_dir)),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(|e| Error::io_with_path(e, &self.log_dir))?.path();
            if path.is_file() && is_record(&path) {
                fs::remove_file(&path).map_err(|e| Error::io_with_path(e, &path))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Whether `path` is named like a record this crate writes:
/// `<base>_<operation tag>_<stage tag>.txt` for a stage the operation runs.
pub fn is_record(path: &Path) -> bool {
    let Some(stem) = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(RECORD_EXTENSION))
        .and_then(|n| n.strip_suffix('.'))
    else {
        return false;
    };

    Operation::ALL.iter().any(|operation| {
        // The kernel size does not appear in record names.
        operation.stages(0).iter().any(|stage| {
            let suffix = format!("_{}_{}", operation.tag(), stage.tag());
            stem.strip_suffix(suffix.as_str()).is_some_and(|base| !base.is_empty())
        })
    })
}
