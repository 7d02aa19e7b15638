//! Debounced, lock-guarded wait-time monitor

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::clock::{Clock, SystemClock};
use super::lock::ExclusiveRunLock;
use super::notifier::{AlertSink, LongWaitDetected, SinkError};
use super::source::{SourceError, WaitTimeSource};
use super::threshold::ThresholdPolicy;

/// Minimum time between two full evaluations on one monitor
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_secs(60);

/// What a single `run` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Debounce window still open; nothing was touched
    NotDue,
    /// Another process holds the run lock
    Locked,
    /// Wait times were calculated and checked
    Evaluated {
        queues_checked: usize,
        alerts_emitted: usize,
    },
}

/// Counters for the status endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    pub runs: u64,
    pub not_due: u64,
    pub locked: u64,
    pub evaluated: u64,
    pub alerts: u64,
    pub errors: u64,
}

/// Checks queue wait times against thresholds at most once per debounce
/// window, and only on the process that wins the run lock.
///
/// `run` is not reentrant; callers ticking from several tasks must
/// serialize calls (see [`super::worker::MonitorWorker`]).
pub struct WaitTimeMonitor {
    source: Box<dyn WaitTimeSource>,
    lock: Box<dyn ExclusiveRunLock>,
    sink: Box<dyn AlertSink>,
    policy: ThresholdPolicy,
    clock: Arc<dyn Clock>,
    debounce_interval: Duration,
    last_run_at: Option<DateTime<Utc>>,
    stats: MonitorStats,
}

impl WaitTimeMonitor {
    pub fn new(
        source: impl WaitTimeSource + 'static,
        lock: impl ExclusiveRunLock + 'static,
        sink: impl AlertSink + 'static,
        policy: ThresholdPolicy,
    ) -> Self {
        Self {
            source: Box::new(source),
            lock: Box::new(lock),
            sink: Box::new(sink),
            policy,
            clock: Arc::new(SystemClock),
            debounce_interval: DEBOUNCE_INTERVAL,
            last_run_at: None,
            stats: MonitorStats::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_debounce_interval(mut self, interval: Duration) -> Self {
        self.debounce_interval = interval;
        self
    }

    /// Start as if an evaluation already happened at `at`
    pub fn with_last_run_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_run_at = Some(at);
        self
    }

    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        self.last_run_at
    }

    pub fn debounce_interval(&self) -> Duration {
        self.debounce_interval
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    /// Run one monitoring tick.
    ///
    /// Source and sink failures propagate. By then `last_run_at` has already
    /// moved forward, so the next attempt waits for the following window.
    pub fn run(&mut self) -> Result<RunOutcome, MonitorError> {
        self.stats.runs += 1;
        let now = self.clock.now();

        if !self.is_due(now) {
            self.stats.not_due += 1;
            tracing::trace!(last_run_at = ?self.last_run_at, "Wait time monitor not due");
            return Ok(RunOutcome::NotDue);
        }

        if !self.lock.try_acquire() {
            self.stats.locked += 1;
            tracing::debug!("Wait time monitor lock not acquired, skipping cycle");
            return Ok(RunOutcome::Locked);
        }

        // Never move backwards if the wall clock does
        self.last_run_at = Some(self.last_run_at.map_or(now, |last| last.max(now)));

        match self.evaluate() {
            Ok(outcome) => {
                self.stats.evaluated += 1;
                Ok(outcome)
            }
            Err(e) => {
                self.stats.errors += 1;
                Err(e)
            }
        }
    }

    fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_run_at {
            None => true,
            // A negative elapsed time (clock went back) is not due
            Some(last) => (now - last)
                .to_std()
                .map(|elapsed| elapsed >= self.debounce_interval)
                .unwrap_or(false),
        }
    }

    fn evaluate(&mut self) -> Result<RunOutcome, MonitorError> {
        let snapshot = self.source.calculate()?;
        let queues_checked = snapshot.len();
        let mut alerts_emitted = 0;

        for (id, wait_seconds) in snapshot.iter() {
            let Some(threshold) = self.policy.is_exceeded(id, wait_seconds) else {
                continue;
            };

            tracing::info!(
                queue = %id,
                seconds = wait_seconds,
                threshold,
                "Queue wait time over threshold"
            );
            self.sink.emit(LongWaitDetected::new(id, wait_seconds))?;
            alerts_emitted += 1;
            self.stats.alerts += 1;
        }

        tracing::debug!(queues_checked, alerts_emitted, "Wait time evaluation complete");

        Ok(RunOutcome::Evaluated {
            queues_checked,
            alerts_emitted,
        })
    }
}

/// Monitor errors
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("Wait time source failed: {0}")]
    Source(#[from] SourceError),

    #[error("Alert sink failed: {0}")]
    Sink(#[from] SinkError),
}
