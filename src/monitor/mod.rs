//! Queue wait-time monitoring
//!
//! A [`WaitTimeMonitor`] is ticked frequently by every worker process. It
//! evaluates wait times at most once per debounce window, only on the
//! process that wins the shared run lock, and raises a [`LongWaitDetected`]
//! alert for each queue whose wait exceeds its threshold.

pub mod checker;
pub mod clock;
pub mod identifier;
pub mod lock;
pub mod notifier;
pub mod source;
pub mod threshold;
pub mod worker;

pub use checker::{MonitorError, MonitorStats, RunOutcome, WaitTimeMonitor, DEBOUNCE_INTERVAL};
pub use clock::{Clock, ManualClock, SystemClock};
pub use identifier::{IdentifierError, QueueIdentifier};
pub use lock::{
    ExclusiveRunLock, FileLock, LockStore, TtlLock, LOCK_FILE_NAME, WAIT_TIME_MONITOR_LOCK_KEY,
};
pub use notifier::{AlertSink, ChannelSink, FanoutSink, LogSink, LongWaitDetected, SinkError, WebhookNotifier};
pub use source::{FileWaitTimeSource, SourceError, WaitTimeSnapshot, WaitTimeSource};
pub use threshold::{ThresholdPolicy, ThresholdTable, DEFAULT_THRESHOLD_SECS};
pub use worker::{MonitorStatus, MonitorWorker, DEFAULT_TICK_INTERVAL};
