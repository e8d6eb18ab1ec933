//! Benchmark runner
//!
//! Executes one workload on a dedicated OS thread, relays its progress over
//! an unbounded channel and delivers exactly one terminal event.
//!
//! Cancellation is abrupt: the worker thread is detached, never joined and
//! never signalled. Anything the workload owns at that point (memory, open
//! files, scratch directories) stays allocated until the workload returns on
//! its own or the process exits.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bench::sink::ProgressSink;
use crate::models::{BenchmarkResult, ProgressEvent, Subsystem};
use crate::workloads::{Workload, WorkloadError};
use crate::{Result, SysmarkError};

/// Lifecycle of a runner; the last three states are final
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Created, workload not started yet
    Idle,
    /// Workload is executing on the worker thread
    Running,
    /// Workload returned successfully
    Completed,
    /// Run was cancelled before the workload returned
    Cancelled,
    /// Workload returned an error or panicked
    Failed,
}

impl RunnerState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunnerState::Completed | RunnerState::Cancelled | RunnerState::Failed
        )
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunnerState::Idle => "idle",
            RunnerState::Running => "running",
            RunnerState::Completed => "completed",
            RunnerState::Cancelled => "cancelled",
            RunnerState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Event delivered to the observer of a runner
#[derive(Debug)]
pub enum RunnerEvent {
    Progress(ProgressEvent),
    Completed(BenchmarkResult),
    Failed(WorkloadError),
    Cancelled,
}

impl RunnerEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunnerEvent::Progress(_))
    }
}

#[derive(Debug)]
struct Inner {
    state: RunnerState,
    events: Option<mpsc::UnboundedSender<RunnerEvent>>,
    percent: i32,
    status: String,
}

/// State shared between the runner handle, its sink and its event stream
///
/// Events are enqueued while the lock is held, so the channel order always
/// agrees with the state transitions.
#[derive(Debug)]
struct Shared {
    inner: Mutex<Inner>,
}

impl Shared {
    fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: RunnerState::Idle,
                events: None,
                percent: 0,
                status: String::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state(&self) -> RunnerState {
        self.lock().state
    }

    fn progress(&self, update: impl FnOnce(&mut Inner)) {
        let mut inner = self.lock();
        if inner.state != RunnerState::Running {
            return;
        }
        update(&mut inner);
        let event = ProgressEvent::new(inner.percent, inner.status.clone());
        if let Some(tx) = &inner.events {
            // Receiver gone means nobody is watching; the run continues.
            let _ = tx.send(RunnerEvent::Progress(event));
        }
    }

    /// Leave `Running` for `state`, emitting `event` as the final event.
    /// Returns false if the run had already ended.
    fn finish(&self, state: RunnerState, event: RunnerEvent) -> bool {
        let mut inner = self.lock();
        if inner.state != RunnerState::Running {
            return false;
        }
        inner.state = state;
        if let Some(tx) = inner.events.take() {
            let _ = tx.send(event);
        }
        true
    }
}

/// Sink handed to the workload; silent once the run has ended
struct ChannelSink {
    shared: Arc<Shared>,
}

impl ProgressSink for ChannelSink {
    fn report_progress(&self, percent: i32) {
        self.shared.progress(|inner| inner.percent = percent);
    }

    fn report_status(&self, text: &str) {
        self.shared.progress(|inner| inner.status = text.to_string());
    }
}

/// Ordered stream of one runner's events
///
/// Ends after the terminal event. Progress still queued when the run is
/// cancelled is discarded, so `Cancelled` is the next event seen after
/// [`BenchmarkRunner::cancel`] returns.
#[derive(Debug)]
pub struct RunnerEvents {
    rx: mpsc::UnboundedReceiver<RunnerEvent>,
    shared: Arc<Shared>,
}

impl RunnerEvents {
    /// Wait for the next event; `None` once the run has ended
    pub async fn recv(&mut self) -> Option<RunnerEvent> {
        loop {
            let event = self.rx.recv().await?;
            if !self.is_stale(&event) {
                return Some(event);
            }
        }
    }

    /// Next event if one is ready, without waiting
    pub fn try_recv(&mut self) -> Option<RunnerEvent> {
        loop {
            let event = self.rx.try_recv().ok()?;
            if !self.is_stale(&event) {
                return Some(event);
            }
        }
    }

    fn is_stale(&self, event: &RunnerEvent) -> bool {
        matches!(event, RunnerEvent::Progress(_)) && self.shared.state() == RunnerState::Cancelled
    }
}

/// Single-use handle executing one workload off the coordinating thread
pub struct BenchmarkRunner {
    subsystem: Subsystem,
    shared: Arc<Shared>,
    worker: Option<thread::JoinHandle<()>>,
    started_at: Option<Instant>,
}

impl BenchmarkRunner {
    pub fn new(subsystem: Subsystem) -> Self {
        Self {
            subsystem,
            shared: Arc::new(Shared::new()),
            worker: None,
            started_at: None,
        }
    }

    pub fn subsystem(&self) -> Subsystem {
        self.subsystem
    }

    pub fn state(&self) -> RunnerState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunnerState::Running
    }

    /// Time since `start`, if started
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at.map(|t| t.elapsed())
    }

    /// Start the workload on a new thread and return its event stream
    ///
    /// Only valid once, from `Idle`. A second call fails with
    /// [`SysmarkError::InvalidState`] and changes nothing.
    pub fn start(&mut self, workload: Arc<dyn Workload>) -> Result<RunnerEvents> {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut inner = self.shared.lock();
            if inner.state != RunnerState::Idle {
                return Err(SysmarkError::InvalidState {
                    operation: "start",
                    state: inner.state,
                });
            }
            inner.state = RunnerState::Running;
            inner.events = Some(tx);
        }

        let started_at = Instant::now();
        self.started_at = Some(started_at);
        let subsystem = self.subsystem;
        let shared = Arc::clone(&self.shared);

        info!(%subsystem, "benchmark started");
        let spawned = thread::Builder::new()
            .name(format!("sysmark-{}", subsystem.name()))
            .spawn(move || run_workload(subsystem, workload, shared, started_at));

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(RunnerEvents {
                    rx,
                    shared: Arc::clone(&self.shared),
                })
            }
            Err(e) => {
                self.shared.finish(
                    RunnerState::Failed,
                    RunnerEvent::Failed(WorkloadError::Kernel(format!(
                        "could not spawn worker thread: {}",
                        e
                    ))),
                );
                Err(SysmarkError::Io(e))
            }
        }
    }

    /// Abandon a running workload
    ///
    /// From `Running` the runner becomes `Cancelled` immediately and emits a
    /// single `Cancelled` event; the workload is not told and gets no chance
    /// to clean up. Cancelling an `Idle` runner is an `InvalidState` error.
    /// Cancelling a finished runner does nothing.
    pub fn cancel(&mut self) -> Result<()> {
        match self.state() {
            RunnerState::Idle => Err(SysmarkError::InvalidState {
                operation: "cancel",
                state: RunnerState::Idle,
            }),
            RunnerState::Running => {
                if self
                    .shared
                    .finish(RunnerState::Cancelled, RunnerEvent::Cancelled)
                {
                    // Dropping the handle detaches the thread.
                    self.worker.take();
                    warn!(
                        subsystem = %self.subsystem,
                        "benchmark cancelled, worker thread abandoned"
                    );
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for BenchmarkRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BenchmarkRunner")
            .field("subsystem", &self.subsystem)
            .field("state", &self.state())
            .finish()
    }
}

fn run_workload(
    subsystem: Subsystem,
    workload: Arc<dyn Workload>,
    shared: Arc<Shared>,
    started_at: Instant,
) {
    let sink = ChannelSink {
        shared: Arc::clone(&shared),
    };
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| workload.run(&sink)));
    let elapsed = started_at.elapsed();

    let delivered = match outcome {
        Ok(Ok(output)) => {
            let result = BenchmarkResult::new(
                subsystem,
                output.per_test_scores,
                output.total_score,
                output.total_wattage,
                elapsed,
            );
            let total_score = result.total_score;
            let delivered = shared.finish(RunnerState::Completed, RunnerEvent::Completed(result));
            if delivered {
                info!(
                    %subsystem,
                    total_score,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "benchmark finished"
                );
            }
            delivered
        }
        Ok(Err(err)) => {
            let message = err.to_string();
            let delivered = shared.finish(RunnerState::Failed, RunnerEvent::Failed(err));
            if delivered {
                warn!(%subsystem, error = %message, "benchmark failed");
            }
            delivered
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            let delivered = shared.finish(
                RunnerState::Failed,
                RunnerEvent::Failed(WorkloadError::Panicked(message.clone())),
            );
            if delivered {
                warn!(%subsystem, panic = %message, "benchmark panicked");
            }
            delivered
        }
    };

    if !delivered {
        debug!(%subsystem, "workload returned after cancellation, outcome dropped");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
