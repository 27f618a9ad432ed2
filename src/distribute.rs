//! Work distribution across processes and threads.
//!
//! Process level: every rank scans the input directory the same way, so index
//! `i` names the same image everywhere, and takes the indices
//! `rank, rank + size, rank + 2 * size, ...`. No coordination is needed for the
//! partition itself.
//!
//! Thread level: a fixed-size pool runs a work-sharing loop in which each
//! worker claims the next unclaimed item from a shared cursor.

use crate::error::{Error, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Default cap on the number of images taken from the input directory.
pub const MAX_IMAGES: usize = 600;

/// Suffix an input file name must end with.
pub const IMAGE_SUFFIX: &str = ".bmp";

/// Get the number of available CPU cores.
pub fn available_parallelism() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// List the bitmaps in `dir` in a deterministic order.
///
/// Non-recursive; regular files ending in `.bmp`, sorted by file name and
/// truncated to `max_images`.
pub fn discover_images(dir: &Path, max_images: usize) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io_with_path(e, dir))?;

    let mut images = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io_with_path(e, dir))?;
        let path = entry.path();
        if path.is_file() && is_bitmap_name(&path) {
            images.push(path);
        }
    }

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    images.truncate(max_images);
    Ok(images)
}

fn is_bitmap_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.len() > IMAGE_SUFFIX.len() && n.ends_with(IMAGE_SUFFIX))
}

/// File name with the `.bmp` suffix removed.
pub fn base_name(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(IMAGE_SUFFIX) {
        Some(base) => base.to_string(),
        None => name,
    }
}

/// The image indices one rank is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkAssignment {
    rank: usize,
    size: usize,
    total: usize,
}

impl WorkAssignment {
    /// Assignment for `rank` out of `size` processes over `total` images.
    pub fn new(rank: usize, size: usize, total: usize) -> Result<Self> {
        if size == 0 || rank >= size {
            return Err(Error::InvalidArgument {
                argument: String::from("--rank"),
                reason: format!("rank {rank} is not within a group of {size} processes"),
            });
        }
        Ok(Self { rank, size, total })
    }

    /// `rank, rank + size, ...` below `total`.
    pub fn indices(&self) -> impl Iterator<Item = usize> {
        (self.rank..self.total).step_by(self.size)
    }

    pub fn len(&self) -> usize {
        self.total.saturating_sub(self.rank).div_ceil(self.size)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pick this rank's share out of the full image list.
    pub fn select<T: Clone>(&self, items: &[T]) -> Vec<T> {
        self.indices().filter_map(|i| items.get(i).cloned()).collect()
    }
}

/// A fixed-size pool of worker threads.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Create a pool with exactly `num_threads` workers.
    pub fn new(num_threads: usize) -> Result<Self> {
        if num_threads == 0 {
            return Err(Error::InvalidArgument {
                argument: String::from("--threads"),
                reason: String::from("Number of threads must be at least 1"),
            });
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("bmpfx-worker-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    /// Get the number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `job` once per item, each worker claiming one item at a time.
    ///
    /// Blocks until every item is done. Results are returned in item order.
    pub fn run_claimed<T, R, F>(&self, items: &[T], job: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        if items.is_empty() {
            return Vec::new();
        }

        let cursor = AtomicUsize::new(0);
        let per_worker: Vec<Vec<(usize, R)>> = self.pool.broadcast(|_| {
            let mut done = Vec::new();
            loop {
                let index = cursor.fetch_add(1, Ordering::Relaxed);
                let Some(item) = items.get(index) else {
                    break;
                };
                done.push((index, job(item)));
            }
            done
        });

        let mut results: Vec<(usize, R)> = per_worker.into_iter().flatten().collect();
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, r)| r).collect()
    }
}
