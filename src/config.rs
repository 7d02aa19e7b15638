//! Daemon configuration
//!
//! Environment variables:
//! - WAITWATCH_HOST / WAITWATCH_PORT: status server bind address (0.0.0.0:8080)
//! - WAITWATCH_NODE_ID: lock owner name for this process (node-1)
//! - WAITWATCH_TICK_SECS: scheduler cadence (5)
//! - WAITWATCH_DEBOUNCE_SECS: minimum time between evaluations (60)
//! - WAITWATCH_LOCK_TTL_SECS: run lock lifetime (60)
//! - WAITWATCH_LOCK_FILE: run lock file shared by every daemon
//!   (waitwatch-monitor.lock beside the wait-times file)
//! - WAITWATCH_DEFAULT_THRESHOLD: threshold for unlisted queues (60)
//! - WAITWATCH_WAITS_FILE: JSON object of per-queue thresholds
//! - WAITWATCH_WAITS: `redis:default=60,redis:low=0`, overrides the file
//! - WAITWATCH_WAIT_TIMES_FILE: JSON wait times to monitor (wait-times.json)
//! - WAITWATCH_WEBHOOK_URL: optional alert webhook

use std::path::PathBuf;
use std::time::Duration;

use crate::monitor::identifier::IdentifierError;
use crate::monitor::threshold::{parse_seconds, ThresholdTable};
use crate::monitor::{DEBOUNCE_INTERVAL, DEFAULT_THRESHOLD_SECS, DEFAULT_TICK_INTERVAL};
use crate::monitor::lock::{DEFAULT_LOCK_TTL, LOCK_FILE_NAME};

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub host: String,
    pub port: u16,
    pub node_id: String,
    pub tick_interval: Duration,
    pub debounce_interval: Duration,
    pub lock_ttl: Duration,
    pub thresholds: ThresholdTable,
    pub wait_times_file: PathBuf,
    /// Processes coordinate through this file; it must be on a filesystem
    /// every daemon sees
    pub lock_file: PathBuf,
    pub webhook_url: Option<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            node_id: "node-1".to_string(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            debounce_interval: DEBOUNCE_INTERVAL,
            lock_ttl: DEFAULT_LOCK_TTL,
            thresholds: ThresholdTable::new(),
            wait_times_file: PathBuf::from("wait-times.json"),
            lock_file: PathBuf::from(LOCK_FILE_NAME),
            webhook_url: None,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match var("WAITWATCH_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                name: "WAITWATCH_PORT".to_string(),
                value: raw,
            })?,
            None => defaults.port,
        };

        let tick_interval =
            nonzero_secs_var(&var, "WAITWATCH_TICK_SECS")?.unwrap_or(defaults.tick_interval);
        let debounce_interval = nonzero_secs_var(&var, "WAITWATCH_DEBOUNCE_SECS")?
            .unwrap_or(defaults.debounce_interval);
        let lock_ttl = nonzero_secs_var(&var, "WAITWATCH_LOCK_TTL_SECS")?.unwrap_or(defaults.lock_ttl);

        let wait_times_file = var("WAITWATCH_WAIT_TIMES_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.wait_times_file);
        let lock_file = var("WAITWATCH_LOCK_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| wait_times_file.with_file_name(LOCK_FILE_NAME));

        let mut thresholds = match var("WAITWATCH_WAITS_FILE") {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| ConfigError::Io(format!("{}: {}", path, e)))?;
                ThresholdTable::from_json(&raw)?
            }
            None => ThresholdTable::new(),
        };
        if let Some(pairs) = var("WAITWATCH_WAITS") {
            thresholds = thresholds.merge(ThresholdTable::parse_pairs(&pairs)?);
        }
        thresholds.default_threshold = match var("WAITWATCH_DEFAULT_THRESHOLD") {
            Some(raw) => parse_seconds("WAITWATCH_DEFAULT_THRESHOLD", raw.trim())?,
            None => DEFAULT_THRESHOLD_SECS,
        };

        Ok(Self {
            host: var("WAITWATCH_HOST").unwrap_or(defaults.host),
            port,
            node_id: var("WAITWATCH_NODE_ID").unwrap_or(defaults.node_id),
            tick_interval,
            debounce_interval,
            lock_ttl,
            thresholds,
            wait_times_file,
            lock_file,
            webhook_url: var("WAITWATCH_WEBHOOK_URL").filter(|url| !url.trim().is_empty()),
        })
    }
}

fn secs_var<F>(var: &F, name: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidValue {
                    name: name.to_string(),
                    value: raw,
                })
        })
        .transpose()
}

/// Like [`secs_var`], but zero is rejected
fn nonzero_secs_var<F>(var: &F, name: &str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match secs_var(var, name)? {
        Some(secs) if secs.is_zero() => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            value: "0".to_string(),
        }),
        other => Ok(other),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid threshold for {queue}: {value} (expected non-negative whole seconds)")]
    InvalidThreshold { queue: String, value: String },

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },

    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    #[error("IO error: {0}")]
    Io(String),
}
