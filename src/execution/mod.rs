//! Bounded parallel file hashing.
//!
//! The only parallel section of a recipe run. [`hash_into_rows`] spawns one lightweight task per
//! row on the rayon pool; a counting [`Semaphore`] admits at most `threads` of them into their
//! read-and-hash phase at a time, and the enclosing scope is the barrier: it returns only once
//! every task has finished.
//!
//! Each task owns exactly one row and is the only writer of that row. A missing or unreadable
//! file gives an empty hash for that row; it never fails the batch.

mod metrics;
mod semaphore;

use std::fs;
use std::path::Path;

use md5::{Digest, Md5};

use crate::error::{RecipeError, RecipeResult};
use crate::observability::{RecipeEvent, RecipeObserver};
use crate::types::{Row, Value};

pub use metrics::{HashMetrics, HashMetricsSnapshot};

use semaphore::Semaphore;

/// Lowercase hex MD5 of a file's bytes, or `None` when it cannot be read.
pub fn file_md5(path: impl AsRef<Path>) -> Option<String> {
    let bytes = fs::read(path).ok()?;
    Some(hex::encode(Md5::digest(&bytes)))
}

/// Hash `filenames[i]` into `rows[i][column]` for every row, with at most `threads` files being
/// read at once.
///
/// `rows` and `filenames` must have the same length, else `InvalidArgument`. `threads` is clamped
/// to `1..=rows.len()`.
pub fn hash_into_rows(
    rows: &mut [Row],
    filenames: &[String],
    column: &str,
    threads: usize,
    observer: Option<&dyn RecipeObserver>,
) -> RecipeResult<HashMetricsSnapshot> {
    if rows.len() != filenames.len() {
        return Err(RecipeError::invalid_argument(
            "filenames",
            format!("{} filenames for {} rows", filenames.len(), rows.len()),
        ));
    }

    let metrics = HashMetrics::new();
    if rows.is_empty() {
        return Ok(metrics.snapshot());
    }

    let gate = Semaphore::new(threads.clamp(1, rows.len()));
    let metrics_ref = &metrics;
    let gate_ref = &gate;

    rayon::scope(|s| {
        for (index, (row, filename)) in rows.iter_mut().zip(filenames).enumerate() {
            s.spawn(move |_| {
                let digest = {
                    let permit = gate_ref.acquire();
                    if !permit.waited.is_zero() {
                        metrics_ref.on_throttle_wait(permit.waited);
                        if let Some(obs) = observer {
                            obs.on_event(&RecipeEvent::HashThrottled {
                                row: index,
                                waited: permit.waited,
                            });
                        }
                    }

                    metrics_ref.on_task_start();
                    let digest = file_md5(filename);
                    metrics_ref.on_task_end(digest.is_some());
                    digest
                };

                row.insert(column.to_owned(), Value::text(digest.unwrap_or_default()));
            });
        }
    });

    Ok(metrics.snapshot())
}
