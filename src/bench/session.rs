//! Benchmark session
//!
//! Owns one runner slot per subsystem, merges every runner's events into a
//! single stream tagged with the subsystem, and records completed results.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bench::aggregator::ResultAggregator;
use crate::bench::power::PowerMeter;
use crate::bench::runner::{BenchmarkRunner, RunnerEvent, RunnerState};
use crate::config::persistence::ResultsStorage;
use crate::config::BenchmarkConfig;
use crate::models::{BenchmarkResult, RunningTotals, Subsystem};
use crate::workloads::{workload_for, Workload};
use crate::{Result, SysmarkError};

/// Event relayed by a forwarding task; `None` marks the end of that run
struct Envelope {
    run_id: u64,
    subsystem: Subsystem,
    event: Option<RunnerEvent>,
}

struct Slot {
    run_id: u64,
    runner: BenchmarkRunner,
}

/// Coordinator shared by the console runner and the TUI
pub struct BenchmarkSession {
    config: BenchmarkConfig,
    meter: Arc<dyn PowerMeter>,
    storage: Option<ResultsStorage>,
    slots: HashMap<Subsystem, Slot>,
    aggregator: ResultAggregator,
    events_tx: mpsc::UnboundedSender<Envelope>,
    events_rx: mpsc::UnboundedReceiver<Envelope>,
    next_run_id: u64,
    open_streams: usize,
}

impl BenchmarkSession {
    pub fn new(config: BenchmarkConfig, meter: Arc<dyn PowerMeter>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config,
            meter,
            storage: None,
            slots: HashMap::new(),
            aggregator: ResultAggregator::new(),
            events_tx,
            events_rx,
            next_run_id: 0,
            open_streams: 0,
        }
    }

    /// Persist completed results to `storage` when saving is enabled
    pub fn with_storage(mut self, storage: ResultsStorage) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    pub fn storage(&self) -> Option<&ResultsStorage> {
        self.storage.as_ref()
    }

    /// Start the configured workload for `subsystem`
    pub fn start(&mut self, subsystem: Subsystem) -> Result<()> {
        let workload = workload_for(subsystem, &self.config, Arc::clone(&self.meter));
        self.start_with(subsystem, workload)
    }

    /// Start `workload` in the slot of `subsystem`
    ///
    /// Fails with `InvalidState` while that subsystem is still running. A
    /// finished slot is replaced by a fresh runner.
    pub fn start_with(&mut self, subsystem: Subsystem, workload: Arc<dyn Workload>) -> Result<()> {
        if self.is_running(subsystem) {
            return Err(SysmarkError::InvalidState {
                operation: "start",
                state: RunnerState::Running,
            });
        }

        let mut runner = BenchmarkRunner::new(subsystem);
        let mut events = runner.start(workload)?;

        self.next_run_id += 1;
        let run_id = self.next_run_id;
        self.slots.insert(subsystem, Slot { run_id, runner });
        self.open_streams += 1;

        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let envelope = Envelope {
                    run_id,
                    subsystem,
                    event: Some(event),
                };
                if tx.send(envelope).is_err() {
                    return;
                }
            }
            let _ = tx.send(Envelope {
                run_id,
                subsystem,
                event: None,
            });
        });

        Ok(())
    }

    /// Wait for the next event of any run
    ///
    /// Returns `None` once no run has events left to deliver.
    pub async fn next_event(&mut self) -> Option<(Subsystem, RunnerEvent)> {
        while self.open_streams > 0 {
            let envelope = self.events_rx.recv().await?;
            if let Some(item) = self.accept(envelope) {
                return Some(item);
            }
        }
        None
    }

    /// Next event if one is ready, without waiting
    pub fn try_next_event(&mut self) -> Option<(Subsystem, RunnerEvent)> {
        while let Ok(envelope) = self.events_rx.try_recv() {
            if let Some(item) = self.accept(envelope) {
                return Some(item);
            }
        }
        None
    }

    fn accept(&mut self, envelope: Envelope) -> Option<(Subsystem, RunnerEvent)> {
        let Some(event) = envelope.event else {
            self.open_streams = self.open_streams.saturating_sub(1);
            return None;
        };

        // A replaced run still counts, but its events never reach the slot's
        // current run.
        if self.is_replaced(envelope.run_id, envelope.subsystem) {
            if let RunnerEvent::Completed(result) = &event {
                self.record(result);
            }
            debug!(
                subsystem = %envelope.subsystem,
                run_id = envelope.run_id,
                "dropped event of replaced run"
            );
            return None;
        }

        match &event {
            RunnerEvent::Progress(_) if self.is_cancelled(envelope.subsystem) => return None,
            RunnerEvent::Completed(result) => self.record(result),
            _ => {}
        }

        Some((envelope.subsystem, event))
    }

    fn is_replaced(&self, run_id: u64, subsystem: Subsystem) -> bool {
        self.slots
            .get(&subsystem)
            .map_or(true, |slot| slot.run_id != run_id)
    }

    /// Progress from a cancelled run is never shown
    fn is_cancelled(&self, subsystem: Subsystem) -> bool {
        self.state(subsystem) == RunnerState::Cancelled
    }

    fn record(&mut self, result: &BenchmarkResult) {
        self.aggregator.record(result);
        debug!(
            subsystem = %result.subsystem,
            totals = ?self.aggregator.current_totals(),
            "result recorded"
        );

        if !self.config.session.save_results {
            return;
        }
        // JSON has no NaN or infinity; such a result would corrupt the file
        if !result.is_finite() {
            warn!(subsystem = %result.subsystem, "not saving result with non-finite scores");
            return;
        }
        if let Some(storage) = &self.storage {
            if let Err(e) = storage.append_result(result.clone()) {
                warn!(
                    error = %e,
                    path = %storage.results_path().display(),
                    "failed to save result"
                );
            }
        }
    }

    /// Cancel the run of `subsystem`
    ///
    /// Same rules as [`BenchmarkRunner::cancel`]; a subsystem that was never
    /// started counts as `Idle`.
    pub fn cancel(&mut self, subsystem: Subsystem) -> Result<()> {
        match self.slots.get_mut(&subsystem) {
            Some(slot) => slot.runner.cancel(),
            None => Err(SysmarkError::InvalidState {
                operation: "cancel",
                state: RunnerState::Idle,
            }),
        }
    }

    /// Cancel every running run; returns how many were cancelled
    pub fn cancel_all(&mut self) -> usize {
        let mut cancelled = 0;
        for slot in self.slots.values_mut() {
            if slot.runner.is_running() && slot.runner.cancel().is_ok() {
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            info!(cancelled, "cancelled running benchmarks");
        }
        cancelled
    }

    pub fn state(&self, subsystem: Subsystem) -> RunnerState {
        self.slots
            .get(&subsystem)
            .map(|slot| slot.runner.state())
            .unwrap_or(RunnerState::Idle)
    }

    pub fn is_running(&self, subsystem: Subsystem) -> bool {
        self.state(subsystem) == RunnerState::Running
    }

    pub fn any_running(&self) -> bool {
        self.slots.values().any(|slot| slot.runner.is_running())
    }

    /// The runner currently in `subsystem`'s slot
    pub fn runner(&self, subsystem: Subsystem) -> Option<&BenchmarkRunner> {
        self.slots.get(&subsystem).map(|slot| &slot.runner)
    }

    pub fn totals(&self) -> RunningTotals {
        self.aggregator.current_totals()
    }

    pub fn aggregator(&self) -> &ResultAggregator {
        &self.aggregator
    }

    /// Forget the totals and score history of this session
    pub fn reset_totals(&mut self) {
        self.aggregator.reset();
    }

    /// Seed the score history from storage; returns the number of results loaded
    pub fn load_history(&mut self) -> Result<usize> {
        let Some(storage) = &self.storage else {
            return Ok(0);
        };
        let results = storage.load_results()?;
        self.aggregator.seed_history(results.iter());
        Ok(results.len())
    }
}

impl Drop for BenchmarkSession {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
