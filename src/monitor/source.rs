//! Wait-time sources
//!
//! The monitor never computes wait times itself; it asks a [`WaitTimeSource`]
//! for a point-in-time [`WaitTimeSnapshot`] once per evaluation cycle.

use std::collections::HashMap;
use std::path::PathBuf;

use super::identifier::QueueIdentifier;

/// One point-in-time read of queue wait times, in seconds.
///
/// Iteration follows insertion order. Inserting an identifier that is
/// already present replaces its value without moving it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitTimeSnapshot {
    entries: Vec<(QueueIdentifier, u64)>,
    /// Position of each identifier in `entries`
    index: HashMap<QueueIdentifier, usize>,
}

impl WaitTimeSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: QueueIdentifier, wait_seconds: u64) {
        match self.index.get(&id) {
            Some(&pos) => self.entries[pos].1 = wait_seconds,
            None => {
                self.index.insert(id.clone(), self.entries.len());
                self.entries.push((id, wait_seconds));
            }
        }
    }

    pub fn get(&self, id: &QueueIdentifier) -> Option<u64> {
        self.index.get(id).map(|&pos| self.entries[pos].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QueueIdentifier, u64)> {
        self.entries.iter().map(|(id, wait)| (id, *wait))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(QueueIdentifier, u64)> for WaitTimeSnapshot {
    fn from_iter<I: IntoIterator<Item = (QueueIdentifier, u64)>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for (id, wait) in iter {
            snapshot.insert(id, wait);
        }
        snapshot
    }
}

impl IntoIterator for WaitTimeSnapshot {
    type Item = (QueueIdentifier, u64);
    type IntoIter = std::vec::IntoIter<(QueueIdentifier, u64)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Produces the current wait time of every known queue.
///
/// Implementations may be expensive (scanning per-queue statistics); the
/// monitor's debounce and run lock bound how often this is called.
pub trait WaitTimeSource: Send {
    fn calculate(&self) -> Result<WaitTimeSnapshot, SourceError>;
}

impl<T: WaitTimeSource + Sync + ?Sized> WaitTimeSource for std::sync::Arc<T> {
    fn calculate(&self) -> Result<WaitTimeSnapshot, SourceError> {
        (**self).calculate()
    }
}

/// Reads wait times published by an external aggregator as a JSON object
/// (`{"redis:default": 42}`), re-reading the file on every calculation.
#[derive(Debug, Clone)]
pub struct FileWaitTimeSource {
    path: PathBuf,
}

impl FileWaitTimeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl WaitTimeSource for FileWaitTimeSource {
    fn calculate(&self) -> Result<WaitTimeSnapshot, SourceError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            SourceError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let waits: HashMap<QueueIdentifier, u64> = serde_json::from_str(&raw)
            .map_err(|e| SourceError::Malformed(format!("{}: {}", self.path.display(), e)))?;

        // Longest waits first, the order operators read alerts in
        let mut entries: Vec<_> = waits.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(entries.into_iter().collect())
    }
}

/// Wait-time source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Wait times unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed wait times: {0}")]
    Malformed(String),
}
