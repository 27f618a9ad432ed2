//! Diagnostic output.
//!
//! All threads of a process log through one `tracing` subscriber writing to
//! stderr. Each event is formatted in full and written under the stderr lock,
//! so lines from concurrent workers never interleave. Stdout stays free for
//! the inter-process protocol.

use std::io;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Install the process-wide subscriber.
///
/// Returns `false` if a subscriber was already installed.
pub fn init() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}
