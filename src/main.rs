//! bmpfx - parallel filters for 24-bit bitmaps

use bmpfx::cli::Config;
use bmpfx::driver::{run_coordinator, run_worker};
use bmpfx::logging;
use bmpfx::terminal::{print_error, print_summary};
use clap::Parser;
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    // Help and version exit here.
    let config = Config::parse();
    logging::init();

    match config.rank {
        Some(rank) if rank > 0 => match run_worker(&config, rank) {
            // Operation failures travel in the report.
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                error!(rank, error = %e, "worker aborted");
                ExitCode::from(1)
            }
        },
        _ => match run_coordinator(&config) {
            Ok(summary) => {
                print_summary(&summary);
                if summary.is_clean() {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::from(1)
                }
            }
            Err(e) => {
                print_error(&e.to_string());
                ExitCode::from(1)
            }
        },
    }
}
