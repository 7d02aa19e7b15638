use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task;
use tokio::time::{self, MissedTickBehavior};

use super::checker::{MonitorError, MonitorStats, RunOutcome, WaitTimeMonitor};

/// Default scheduler cadence; much shorter than the debounce interval
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Ticks a [`WaitTimeMonitor`] on a fixed cadence.
///
/// Ticks run on the blocking thread pool since a wait-time source may block
/// indefinitely. Status reads never touch the monitor; they see the state
/// published after the last completed tick.
pub struct MonitorWorker {
    monitor: Mutex<WaitTimeMonitor>,
    published: RwLock<RunSnapshot>,
    interval: Duration,
    running: Arc<AtomicBool>,
    ticking: AtomicBool,
}

/// Monitor state as of the last completed tick
#[derive(Debug, Clone, Copy)]
struct RunSnapshot {
    debounce_interval: Duration,
    last_run_at: Option<DateTime<Utc>>,
    stats: MonitorStats,
}

impl RunSnapshot {
    fn of(monitor: &WaitTimeMonitor) -> Self {
        Self {
            debounce_interval: monitor.debounce_interval(),
            last_run_at: monitor.last_run_at(),
            stats: monitor.stats(),
        }
    }
}

/// Point-in-time view of the worker for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub running: bool,
    /// A tick is executing right now (possibly stuck in the source)
    pub tick_in_progress: bool,
    pub tick_interval_secs: u64,
    pub debounce_interval_secs: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub stats: MonitorStats,
}

impl MonitorWorker {
    pub fn new(monitor: WaitTimeMonitor, interval: Duration) -> Self {
        Self {
            published: RwLock::new(RunSnapshot::of(&monitor)),
            monitor: Mutex::new(monitor),
            interval,
            running: Arc::new(AtomicBool::new(false)),
            ticking: AtomicBool::new(false),
        }
    }

    /// Start the background worker
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            tracing::info!("Wait time monitor started with tick interval {:?}", self.interval);

            let mut interval = time::interval(self.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            while self.running.load(Ordering::SeqCst) {
                interval.tick().await;

                // Errors surface here, at the scheduler; the loop keeps ticking
                let worker = Arc::clone(&self);
                match task::spawn_blocking(move || worker.tick()).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::error!(error = %e, "Wait time monitor run failed"),
                    Err(e) => tracing::error!(error = %e, "Wait time monitor tick aborted"),
                }
            }

            tracing::info!("Wait time monitor stopped");
        })
    }

    /// Run the monitor once, serialized with every other tick.
    ///
    /// Blocks for as long as the wait-time source does.
    pub fn tick(&self) -> Result<RunOutcome, MonitorError> {
        let mut monitor = self.monitor.lock();
        self.ticking.store(true, Ordering::SeqCst);
        let result = monitor.run();
        self.ticking.store(false, Ordering::SeqCst);

        *self.published.write() = RunSnapshot::of(&monitor);
        result
    }

    /// Stop the worker
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if worker is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> MonitorStatus {
        let snapshot = *self.published.read();
        MonitorStatus {
            running: self.is_running(),
            tick_in_progress: self.ticking.load(Ordering::SeqCst),
            tick_interval_secs: self.interval.as_secs(),
            debounce_interval_secs: snapshot.debounce_interval.as_secs(),
            last_run_at: snapshot.last_run_at,
            stats: snapshot.stats,
        }
    }
}
