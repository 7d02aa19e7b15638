//! waitwatch: Queue Wait-Time Monitor
//!
//! Watches the wait times of job queues across a fleet of worker processes
//! and raises a `LongWaitDetected` alert when a queue waits longer than its
//! configured threshold.
//!
//! # Features
//!
//! - **Debounced**: at most one evaluation per monitor per debounce window
//! - **Lock-guarded**: a TTL lock file shared by every daemon lets only one
//!   process evaluate per window; other backends plug in through
//!   `ExclusiveRunLock`
//! - **Per-queue thresholds**: `connection:queue` overrides over a default,
//!   where `0` disables monitoring for a queue
//! - **Pluggable sinks**: tracing, channels, and HTTP webhooks
//!
//! # Example
//!
//! ```no_run
//! use waitwatch::monitor::{
//!     FileLock, FileWaitTimeSource, LogSink, ThresholdPolicy, ThresholdTable, WaitTimeMonitor,
//! };
//! use std::time::Duration;
//!
//! let thresholds = ThresholdTable::parse_pairs("redis:default=60,redis:low=0").unwrap();
//! let mut monitor = WaitTimeMonitor::new(
//!     FileWaitTimeSource::new("wait-times.json"),
//!     FileLock::new("/srv/shared/waitwatch-monitor.lock", Duration::from_secs(60), "node-1"),
//!     LogSink,
//!     ThresholdPolicy::new(thresholds),
//! );
//!
//! // Call on every scheduler tick
//! monitor.run().unwrap();
//! ```

pub mod api;
pub mod config;
pub mod monitor;

// Re-export commonly used types
pub use config::{ConfigError, MonitorConfig};
pub use monitor::{LongWaitDetected, MonitorError, QueueIdentifier, RunOutcome, WaitTimeMonitor};
