//! Coordinator and worker run loops.
//!
//! The coordinator owns every step that must happen exactly once per run:
//! kernel validation, directory setup, the broadcast, the barrier and the
//! global report. Workers only receive the parameters, process their share
//! and report back.

use crate::cli::Config;
use crate::cluster::{self, Gathered, Message, ProcessGroup, RankReport};
use crate::distribute::{WorkAssignment, discover_images};
use crate::error::{Error, Result};
use crate::metrics::MetricsRecorder;
use crate::processor::Processor;
use crate::report::{GlobalReport, ReportAggregator};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Everything the coordinator knows once a run is over.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub kernel_size: u32,
    pub processes: usize,
    pub threads: usize,
    /// Images discovered in the input directory.
    pub images: usize,
    /// Failed operations summed over the ranks that reported.
    pub failures: usize,
    /// Ranks that never reported.
    pub failed_workers: usize,
    pub report: GlobalReport,
    pub report_path: PathBuf,
}

impl RunSummary {
    /// Whether every rank reported and every operation succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures == 0 && self.failed_workers == 0
    }
}

/// Run as rank 0, launching workers through `current_exe` when `processes > 1`.
pub fn run_coordinator(config: &Config) -> Result<RunSummary> {
    let program = env::current_exe()?;
    run_coordinator_with(config, &program)
}

/// Run as rank 0, launching workers from `program`.
pub fn run_coordinator_with(config: &Config, program: &Path) -> Result<RunSummary> {
    let kernel_size = config.resolve_kernel_size();

    create_dir(&config.output_dir)?;
    create_dir(&config.log_dir)?;
    ensure_distinct(&config.input_dir, &config.output_dir)?;
    let stale = MetricsRecorder::new(&config.log_dir).clear_stale()?;
    if stale > 0 {
        debug!(removed = stale, "cleared stale records");
    }

    let images = discover_images(&config.input_dir, config.max_images)?;
    if images.is_empty() {
        warn!(dir = %config.input_dir.display(), "no bitmaps found");
    }
    info!(
        images = images.len(),
        processes = config.processes,
        kernel_size,
        "run started"
    );

    let mut group = if config.processes > 1 {
        ProcessGroup::launch(program, &config.worker_args(), config.processes)?
    } else {
        ProcessGroup::solo()
    };
    group.broadcast_params(kernel_size);

    let processor = Processor::new(config, 0, kernel_size)?;
    let assignment = WorkAssignment::new(0, group.size(), images.len())?;
    let own = processor.run(&images, &assignment);

    let Gathered { reports, failures } = group.gather(own);
    for failure in &failures {
        error!(error = %failure, "worker did not report");
    }

    let elapsed = cluster::reduce_elapsed(&reports);
    let report = ReportAggregator::new(&config.log_dir).aggregate(elapsed)?;
    report.write(&config.report)?;
    info!(
        report = %config.report.display(),
        records = report.records,
        elapsed_secs = report.elapsed_secs,
        "report written"
    );

    Ok(RunSummary {
        kernel_size,
        processes: config.processes,
        threads: processor.num_threads(),
        images: images.len(),
        failures: reports.iter().map(|r| r.failures).sum(),
        failed_workers: failures.len(),
        report,
        report_path: config.report.clone(),
    })
}

/// Run as worker `rank`, talking to the coordinator over stdin/stdout.
pub fn run_worker(config: &Config, rank: usize) -> Result<RankReport> {
    let assignment_size = config.processes;
    if rank == 0 || rank >= assignment_size {
        return Err(Error::InvalidArgument {
            argument: String::from("--rank"),
            reason: format!("worker rank {rank} is not within 1..{assignment_size}"),
        });
    }

    let mut channel = cluster::parent_channel();
    let kernel_size = cluster::receive_params(&mut channel)?;
    debug!(rank, kernel_size, "parameters received");

    let images = discover_images(&config.input_dir, config.max_images)?;
    let processor = Processor::new(config, rank, kernel_size)?;
    let assignment = WorkAssignment::new(rank, assignment_size, images.len())?;
    let report = processor.run(&images, &assignment);

    channel.send(&Message::Done(report.clone()))?;
    Ok(report)
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| Error::io_with_path(e, dir))
}

/// Outputs must not land in the scanned directory: workers scan after rank 0
/// has started writing, and every rank must see the same image list.
fn ensure_distinct(input_dir: &Path, output_dir: &Path) -> Result<()> {
    let same = match (fs::canonicalize(input_dir), fs::canonicalize(output_dir)) {
        (Ok(input), Ok(output)) => input == output,
        _ => input_dir == output_dir,
    };
    if same {
        return Err(Error::InvalidArgument {
            argument: String::from("--output-dir"),
            reason: format!("'{}' is also the input directory", output_dir.display()),
        });
    }
    Ok(())
}
