//! Global throughput report.
//!
//! After the barrier the coordinator alone scans every persisted record, sums
//! the read and write counts, and combines them with the reduced elapsed time.

use crate::error::{Error, Result};
use crate::filters::Traffic;
use crate::metrics::{self, floor_elapsed, is_record, parse_record};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Aggregated totals for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalReport {
    pub total_reads: u64,
    pub total_writes: u64,
    /// Reduced elapsed time across ranks, floored.
    pub elapsed_secs: f64,
    /// Number of records that contributed.
    pub records: usize,
}

impl GlobalReport {
    /// Sum `records` against the reduced elapsed time.
    pub fn from_records<I>(records: I, elapsed_secs: f64) -> Self
    where
        I: IntoIterator<Item = Traffic>,
    {
        let mut report = Self {
            total_reads: 0,
            total_writes: 0,
            elapsed_secs: floor_elapsed(elapsed_secs),
            records: 0,
        };
        for traffic in records {
            report.total_reads += traffic.reads;
            report.total_writes += traffic.writes;
            report.records += 1;
        }
        report
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_reads + self.total_writes
    }

    pub fn instructions(&self) -> u64 {
        metrics::instructions(self.total_bytes())
    }

    pub fn mips(&self) -> f64 {
        metrics::mips(self.total_bytes(), self.elapsed_secs)
    }

    pub fn bytes_per_second(&self) -> f64 {
        metrics::bytes_per_second(self.total_bytes(), self.elapsed_secs)
    }

    /// Render the report file body.
    pub fn to_text(&self) -> String {
        format!(
            "Total reads: {}\n\
             Total writes: {}\n\
             Total instructions: {}\n\
             Total time: {:.6} seconds\n\
             Global MIPS: {:.6}\n\
             Global bytes per second: {:.6}\n",
            self.total_reads,
            self.total_writes,
            self.instructions(),
            self.elapsed_secs,
            self.mips(),
            self.bytes_per_second(),
        )
    }

    /// Write the report file. Written once per run.
    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_text()).map_err(|e| Error::io_with_path(e, path))
    }
}

/// Scans a log directory for per-operation records.
#[derive(Debug, Clone)]
pub struct ReportAggregator {
    log_dir: PathBuf,
}

impl ReportAggregator {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// Traffic from every readable record. Unreadable records are skipped and
    /// files not named like records are ignored.
    pub fn scan(&self) -> Result<Vec<Traffic>> {
        let entries =
            fs::read_dir(&self.log_dir).map_err(|e| Error::io_with_path(e, &self.log_dir))?;

        let mut records = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::io_with_path(e, &self.log_dir))?.path();
            if !path.is_file() || !is_record(&path) {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(text) => records.push(parse_record(&text)),
                Err(e) => warn!(record = %path.display(), error = %e, "skipping unreadable record"),
            }
        }
        Ok(records)
    }

    /// Build the global report for a run whose reduced elapsed time is `elapsed_secs`.
    pub fn aggregate(&self, elapsed_secs: f64) -> Result<GlobalReport> {
        Ok(GlobalReport::from_records(self.scan()?, elapsed_secs))
    }
}
