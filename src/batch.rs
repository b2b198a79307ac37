//! Batch coordination: discover inputs, convert them in parallel, summarize.
//!
//! ## Discovery
//!
//! The input tree is walked with [walkdir](https://docs.rs/walkdir), entries
//! sorted by file name at every level, so discovery order (and therefore task
//! indices and failure order) is the same on every run. Hidden entries and the
//! output directory itself, when it lives inside the input tree, are skipped.
//!
//! Two inputs mapping onto the same output path, compared ignoring ASCII case,
//! abort the run before anything is written.
//!
//! ## Execution
//!
//! All tasks are queued up front and consumed by a dedicated
//! [rayon](https://docs.rs/rayon) pool with exactly `config.workers` threads,
//! which bounds how many files are in flight at once.
//!
//! Cancellation is cooperative: once the [`CancelFlag`] is raised, tasks that
//! have not started are skipped while running ones finish and write their
//! output. A watchdog thread logs tasks that exceed the configured slow-task
//! threshold; conversions are never interrupted.
//!
//! ## Summary
//!
//! [`RunSummary`] lists outcomes in discovery order, regardless of the order
//! in which workers finished.

use crate::config::Config;
use crate::convert::{
    self, ConversionFailure, ConversionOutcome, ConversionTask, ConvertedFile,
};
use crate::markup::{CmarkRenderer, MarkupRenderer};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error(
        "{} and {} both map to {}",
        first.display(),
        second.display(),
        output.display()
    )]
    OutputCollision {
        first: PathBuf,
        second: PathBuf,
        output: PathBuf,
    },
    #[error("cannot walk {}: {source}", path.display())]
    Discovery {
        path: PathBuf,
        source: walkdir::Error,
    },
    #[error("cannot start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Shared cancellation signal. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop dispatching new tasks. Running tasks finish normally.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Progress events, sent while the batch runs.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started {
        total: usize,
        workers: usize,
    },
    TaskStarted {
        index: usize,
        relative: PathBuf,
    },
    TaskFinished {
        index: usize,
        relative: PathBuf,
        /// Tasks finished so far, including this one.
        done: usize,
        total: usize,
        outcome: ConversionOutcome,
    },
    SlowTask {
        index: usize,
        relative: PathBuf,
        elapsed: Duration,
    },
    Cancelled {
        skipped: usize,
    },
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub cancel: CancelFlag,
    pub events: Option<Sender<BatchEvent>>,
    /// Raise the cancel flag on the first failed task.
    pub fail_fast: bool,
}

/// Overall result of a run, mapped onto the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    PartialFailure,
    TotalFailure,
}

impl RunStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::PartialFailure => 1,
            Self::TotalFailure => 2,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::PartialFailure => "partial failure",
            Self::TotalFailure => "total failure",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub discovered: usize,
    /// Successful conversions, in discovery order.
    pub converted: Vec<ConvertedFile>,
    /// Failed conversions, in discovery order.
    pub failures: Vec<ConversionFailure>,
    /// Inputs never started because the run was cancelled.
    pub skipped: Vec<PathBuf>,
    pub cancelled: bool,
    #[serde(rename = "elapsed_ms", serialize_with = "convert::as_millis")]
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.converted.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn status(&self) -> RunStatus {
        if self.discovered == 0 {
            RunStatus::TotalFailure
        } else if self.failures.is_empty() && !self.cancelled {
            RunStatus::Success
        } else {
            RunStatus::PartialFailure
        }
    }
}

// =============================================================================
// Discovery
// =============================================================================

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Source files under the input directory, as paths relative to it.
pub fn discover(config: &Config) -> Result<Vec<PathBuf>, BatchError> {
    let root = &config.input_dir;
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !(is_hidden(e) || e.path() == config.output_dir.as_path())
        });

    let mut found = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(source) if source.depth() == 0 => {
                return Err(BatchError::Discovery {
                    path: root.clone(),
                    source,
                });
            }
            Err(e) => {
                tracing::warn!(path = ?e.path(), "skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() || !config.is_source_file(entry.path()) {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            found.push(relative.to_path_buf());
        }
    }
    Ok(found)
}

/// Fail on the first pair of tasks whose outputs differ only by ASCII case.
fn check_collisions(tasks: &[ConversionTask]) -> Result<(), BatchError> {
    let mut seen: HashMap<String, &ConversionTask> = HashMap::new();
    for task in tasks {
        let key = task.output.to_string_lossy().to_ascii_lowercase();
        if let Some(first) = seen.insert(key, task) {
            return Err(BatchError::OutputCollision {
                first: first.input.clone(),
                second: task.input.clone(),
                output: task.output.clone(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// Execution
// =============================================================================

/// Convert every source file with the default markdown renderer.
pub fn run_batch(config: &Config) -> Result<RunSummary, BatchError> {
    run_batch_with(config, &CmarkRenderer, BatchOptions::default())
}

struct InFlight {
    relative: PathBuf,
    started: Instant,
}

pub fn run_batch_with(
    config: &Config,
    renderer: &dyn MarkupRenderer,
    options: BatchOptions,
) -> Result<RunSummary, BatchError> {
    let started = Instant::now();
    let tasks: Vec<ConversionTask> = discover(config)?
        .into_iter()
        .enumerate()
        .map(|(index, relative)| ConversionTask::new(index, relative, config))
        .collect();
    check_collisions(&tasks)?;

    let total = tasks.len();
    tracing::info!(
        discovered = total,
        workers = config.workers,
        input_dir = %config.input_dir.display(),
        output_dir = %config.output_dir.display(),
        "batch started"
    );
    send(&options.events, BatchEvent::Started {
        total,
        workers: config.workers,
    });

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers)
        .thread_name(|i| format!("m2h-worker-{i}"))
        .build()?;

    let in_flight: Mutex<HashMap<usize, InFlight>> = Mutex::new(HashMap::new());
    let done = AtomicUsize::new(0);
    let events = options.events.as_ref();
    let cancel = &options.cancel;

    let results: Vec<Option<ConversionOutcome>> = thread::scope(|scope| {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        if let Some(threshold) = config.slow_task_warning {
            let in_flight = &in_flight;
            scope.spawn(move || watchdog(in_flight, threshold, stop_rx, events));
        }

        // Indexed collect keeps discovery order regardless of completion order.
        let results = pool.install(|| {
            tasks
                .par_iter()
                .map(|task| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    if let Ok(mut running) = in_flight.lock() {
                        running.insert(task.index, InFlight {
                            relative: task.relative.clone(),
                            started: Instant::now(),
                        });
                    }
                    send_ref(events, BatchEvent::TaskStarted {
                        index: task.index,
                        relative: task.relative.clone(),
                    });

                    let outcome = convert::convert_file(task, renderer);

                    if let Ok(mut running) = in_flight.lock() {
                        running.remove(&task.index);
                    }
                    if options.fail_fast && !outcome.is_success() && !cancel.is_cancelled() {
                        tracing::warn!(
                            path = %task.input.display(),
                            "fail-fast: cancelling remaining tasks"
                        );
                        cancel.cancel();
                    }
                    send_ref(events, BatchEvent::TaskFinished {
                        index: task.index,
                        relative: task.relative.clone(),
                        done: done.fetch_add(1, Ordering::SeqCst) + 1,
                        total,
                        outcome: outcome.clone(),
                    });
                    Some(outcome)
                })
                .collect::<Vec<_>>()
        });
        drop(stop_tx);
        results
    });

    let mut summary = RunSummary {
        discovered: total,
        converted: Vec::new(),
        failures: Vec::new(),
        skipped: Vec::new(),
        cancelled: false,
        elapsed: Duration::ZERO,
    };
    for (task, result) in tasks.iter().zip(results) {
        match result {
            Some(ConversionOutcome::Converted(file)) => summary.converted.push(file),
            Some(ConversionOutcome::Failed(failure)) => summary.failures.push(failure),
            None => summary.skipped.push(task.input.clone()),
        }
    }
    summary.cancelled = cancel.is_cancelled() || !summary.skipped.is_empty();
    summary.elapsed = started.elapsed();

    if summary.cancelled {
        tracing::warn!(skipped = summary.skipped.len(), "batch cancelled");
        send(&options.events, BatchEvent::Cancelled {
            skipped: summary.skipped.len(),
        });
    }
    log_summary(&summary);
    Ok(summary)
}

fn send(events: &Option<Sender<BatchEvent>>, event: BatchEvent) {
    send_ref(events.as_ref(), event);
}

fn send_ref(events: Option<&Sender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = events {
        // A dropped receiver only means nobody is listening.
        let _ = tx.send(event);
    }
}

/// Warn once for each task running longer than `threshold`.
fn watchdog(
    in_flight: &Mutex<HashMap<usize, InFlight>>,
    threshold: Duration,
    stop: Receiver<()>,
    events: Option<&Sender<BatchEvent>>,
) {
    let tick = (threshold / 4).clamp(Duration::from_millis(10), Duration::from_secs(1));
    let mut warned = HashSet::new();
    loop {
        match stop.recv_timeout(tick) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }
        let Ok(running) = in_flight.lock() else {
            return;
        };
        for (&index, task) in running.iter() {
            let elapsed = task.started.elapsed();
            if elapsed >= threshold && warned.insert(index) {
                tracing::warn!(
                    index,
                    path = %task.relative.display(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "conversion is taking longer than expected"
                );
                send_ref(events, BatchEvent::SlowTask {
                    index,
                    relative: task.relative.clone(),
                    elapsed,
                });
            }
        }
    }
}

fn log_summary(summary: &RunSummary) {
    let status = summary.status();
    let elapsed_ms = summary.elapsed.as_millis() as u64;
    match status {
        RunStatus::Success => tracing::info!(
            discovered = summary.discovered,
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            skipped = summary.skipped.len(),
            elapsed_ms,
            %status,
            "batch finished"
        ),
        _ => tracing::error!(
            discovered = summary.discovered,
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            skipped = summary.skipped.len(),
            elapsed_ms,
            %status,
            "batch finished"
        ),
    }
}
