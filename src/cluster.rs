//! Process group: launch, broadcast, barrier and time reduction.
//!
//! Rank 0 (the coordinator) re-executes its own binary once per additional
//! rank. Each worker's stdin carries coordinator-to-worker messages and its
//! stdout carries worker-to-coordinator messages, one JSON object per line.
//! A run exchanges exactly two kinds of message:
//!
//! - `params`: the kernel size, broadcast once before any work starts
//! - `done`: a rank's elapsed time and counts, sent once when its share is finished
//!
//! Collecting one `done` from every worker is the barrier; the elapsed times
//! are then reduced by taking the maximum.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tracing::{debug, warn};

/// What one rank reports after finishing its share.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankReport {
    pub rank: usize,
    /// Wall time spent on the rank's partition.
    pub elapsed_secs: f64,
    /// Images the rank processed.
    pub images: usize,
    /// Operations that failed on this rank.
    pub failures: usize,
}

/// Inter-process message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Run parameters, coordinator to worker.
    Params { kernel_size: u32 },
    /// Completion, worker to coordinator.
    Done(RankReport),
}

/// Newline-delimited JSON message channel over a reader/writer pair.
pub struct Channel<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> Channel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Send one message and flush it.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        let line = serde_json::to_string(message).map_err(|e| Error::protocol(e.to_string()))?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Block until the next message arrives.
    pub fn recv(&mut self) -> Result<Message> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(Error::protocol("channel closed before a message arrived"));
        }
        serde_json::from_str(line.trim_end())
            .map_err(|e| Error::protocol(format!("malformed message {:?}: {e}", line.trim_end())))
    }
}

/// The worker's end: stdin from the coordinator, stdout to it.
pub type ParentChannel = Channel<io::StdinLock<'static>, io::Stdout>;

/// Open the channel to the coordinator. Only meaningful in a worker process.
pub fn parent_channel() -> ParentChannel {
    Channel::new(io::stdin().lock(), io::stdout())
}

/// Wait for the broadcast parameters.
pub fn receive_params<R: BufRead, W: Write>(channel: &mut Channel<R, W>) -> Result<u32> {
    match channel.recv()? {
        Message::Params { kernel_size } => Ok(kernel_size),
        other => Err(Error::protocol(format!("expected params, got {other:?}"))),
    }
}

/// Combine per-rank elapsed times into one figure: the slowest rank.
pub fn reduce_elapsed(reports: &[RankReport]) -> f64 {
    reports.iter().map(|r| r.elapsed_secs).fold(0.0, f64::max)
}

struct WorkerHandle {
    rank: usize,
    child: Child,
    channel: Channel<BufReader<ChildStdout>, ChildStdin>,
    /// Set once the worker is known to be unreachable.
    failure: Option<Error>,
}

/// Result of the barrier on the coordinator.
#[derive(Debug, Default)]
pub struct Gathered {
    /// Reports from every rank that completed, rank 0 included, in rank order.
    pub reports: Vec<RankReport>,
    /// Ranks that did not report.
    pub failures: Vec<Error>,
}

/// The coordinator's view of its worker processes.
#[derive(Default)]
pub struct ProcessGroup {
    workers: Vec<WorkerHandle>,
}

impl ProcessGroup {
    /// A group with no workers; rank 0 does everything.
    pub fn solo() -> Self {
        Self::default()
    }

    /// Spawn ranks `1..size` by running `program` with `args --rank r`.
    pub fn launch(program: &Path, args: &[OsString], size: usize) -> Result<Self> {
        let mut workers = Vec::with_capacity(size.saturating_sub(1));
        for rank in 1..size {
            let mut child = Command::new(program)
                .args(args)
                .arg("--rank")
                .arg(rank.to_string())
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .spawn()
                .map_err(|e| Error::io_with_path(e, program))?;

            let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
                return Err(Error::WorkerFailed {
                    rank,
                    reason: String::from("pipes not available"),
                });
            };
            debug!(rank, pid = child.id(), "worker launched");
            workers.push(WorkerHandle {
                rank,
                child,
                channel: Channel::new(BufReader::new(stdout), stdin),
                failure: None,
            });
        }
        Ok(Self { workers })
    }

    /// Number of ranks, coordinator included.
    pub fn size(&self) -> usize {
        self.workers.len() + 1
    }

    /// Send the kernel size to every worker.
    ///
    /// A worker that cannot be reached is marked failed; the others proceed.
    pub fn broadcast_params(&mut self, kernel_size: u32) {
        let message = Message::Params { kernel_size };
        for worker in &mut self.workers {
            if let Err(e) = worker.channel.send(&message) {
                warn!(rank = worker.rank, error = %e, "broadcast failed");
                worker.failure = Some(Error::WorkerFailed {
                    rank: worker.rank,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Barrier: collect every worker's `done`, then reap the processes.
    pub fn gather(self, own: RankReport) -> Gathered {
        let mut gathered = Gathered {
            reports: vec![own],
            failures: Vec::new(),
        };

        for mut worker in self.workers {
            let outcome = match worker.failure.take() {
                Some(e) => Err(e),
                None => worker.await_done(),
            };

            // Close our end so a stuck reader sees EOF before we wait on it.
            let WorkerHandle {
                rank,
                mut child,
                channel,
                ..
            } = worker;
            drop(channel);
            let status = child.wait();

            match outcome {
                Ok(report) => {
                    match &status {
                        Ok(status) if !status.success() => {
                            warn!(rank, %status, "worker reported but exited abnormally");
                        }
                        Err(e) => warn!(rank, error = %e, "could not reap worker"),
                        Ok(_) => {}
                    }
                    gathered.reports.push(report);
                }
                Err(e) => {
                    let reason = match status {
                        Ok(status) => format!("{e} ({status})"),
                        Err(wait_err) => format!("{e} (wait failed: {wait_err})"),
                    };
                    gathered.failures.push(Error::WorkerFailed { rank, reason });
                }
            }
        }

        gathered
    }
}

impl WorkerHandle {
    fn await_done(&mut self) -> Result<RankReport> {
        match self.channel.recv()? {
            Message::Done(report) if report.rank == self.rank => Ok(report),
            other => Err(Error::protocol(format!(
                "expected done from rank {}, got {other:?}",
                self.rank
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn report(rank: usize, elapsed_secs: f64) -> RankReport {
        RankReport {
            rank,
            elapsed_secs,
            images: 2,
            failures: 0,
        }
    }

    #[test]
    fn test_message_wire_format() {
        let json = serde_json::to_string(&Message::Params { kernel_size: 105 }).unwrap();
        assert_eq!(json, r#"{"type":"params","kernel_size":105}"#);

        let line = r#"{"type":"done","rank":2,"elapsed_secs":1.5,"images":3,"failures":1}"#;
        let done: Message = serde_json::from_str(line).unwrap();
        assert_eq!(
            done,
            Message::Done(RankReport {
                rank: 2,
                elapsed_secs: 1.5,
                images: 3,
                failures: 1
            })
        );
    }

    #[test]
    fn test_channel_send_then_recv() {
        let mut sender = Channel::new(Cursor::new(Vec::new()), Vec::new());
        sender.send(&Message::Params { kernel_size: 55 }).unwrap();
        sender.send(&Message::Done(report(1, 0.25))).unwrap();

        let mut receiver = Channel::new(Cursor::new(sender.writer), io::sink());
        assert_eq!(receive_params(&mut receiver).unwrap(), 55);
        assert_eq!(receiver.recv().unwrap(), Message::Done(report(1, 0.25)));
        assert!(matches!(receiver.recv(), Err(Error::Protocol { .. })));
    }

    #[test]
    fn test_receive_params_rejects_other_messages() {
        let line = format!("{}\n", serde_json::to_string(&Message::Done(report(1, 0.0))).unwrap());
        let mut channel = Channel::new(Cursor::new(line.into_bytes()), io::sink());
        assert!(receive_params(&mut channel).is_err());
    }

    #[test]
    fn test_malformed_line() {
        let mut channel = Channel::new(Cursor::new(b"not json\n".to_vec()), io::sink());
        let err = channel.recv().unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }

    #[test]
    fn test_reduce_elapsed_takes_slowest_rank() {
        let reports = [report(0, 1.25), report(1, 3.5), report(2, 2.0)];
        assert_eq!(reduce_elapsed(&reports), 3.5);
        assert_eq!(reduce_elapsed(&[]), 0.0);
    }

    #[test]
    fn test_solo_group_gathers_own_report() {
        let mut group = ProcessGroup::solo();
        assert_eq!(group.size(), 1);
        group.broadcast_params(105);
        let gathered = group.gather(report(0, 0.5));
        assert_eq!(gathered.reports, vec![report(0, 0.5)]);
        assert!(gathered.failures.is_empty());
    }

    #[test]
    fn test_launch_missing_program() {
        let err = ProcessGroup::launch(Path::new("/no/such/bmpfx"), &[], 2).err().unwrap();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
