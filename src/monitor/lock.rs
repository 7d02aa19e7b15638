//! Run locks
//!
//! Only one monitor may evaluate wait times per debounce window. The lock is
//! a capability: `try_acquire` either wins the slot or returns false
//! immediately. Slots are never released explicitly; they expire.
//!
//! [`FileLock`] coordinates separate processes through a lock file on a
//! shared filesystem. [`TtlLock`] only coordinates monitors inside one
//! process; deployments with another coordination backend implement
//! [`ExclusiveRunLock`] themselves.

use std::fs::OpenOptions;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

/// Key the wait-time monitor locks on
pub const WAIT_TIME_MONITOR_LOCK_KEY: &str = "monitor:time-to-clear";

/// Default slot lifetime, matching the monitor's debounce interval
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(60);

/// Lock file name used next to the shared wait-times file
pub const LOCK_FILE_NAME: &str = "waitwatch-monitor.lock";

static CLAIM_SEQ: AtomicU64 = AtomicU64::new(0);

/// Non-blocking exclusive run lock
pub trait ExclusiveRunLock: Send {
    /// Try to take the slot. Must be cheap when it returns false.
    fn try_acquire(&self) -> bool;
}

impl<T: ExclusiveRunLock + Sync + ?Sized> ExclusiveRunLock for Arc<T> {
    fn try_acquire(&self) -> bool {
        (**self).try_acquire()
    }
}

/// TTL key-value store backing [`TtlLock`]s.
///
/// Behaves like `SET key owner NX EX ttl` on a cache server: the first
/// writer of a key owns it until the entry expires. Clones share storage,
/// so every lock built from one store contends with the others. The store
/// lives in process memory and does not coordinate separate processes.
#[derive(Clone)]
pub struct LockStore {
    slots: Cache<String, Arc<str>>,
}

impl LockStore {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_LOCK_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            slots: Cache::builder().max_capacity(1024).time_to_live(ttl).build(),
        }
    }

    /// Insert `key` if absent. Returns true when this call created the slot.
    pub fn set_if_absent(&self, key: &str, owner: &str) -> bool {
        self.slots
            .entry(key.to_string())
            .or_insert_with(|| Arc::from(owner))
            .is_fresh()
    }

    /// Current owner of a slot, if it has not expired
    pub fn owner(&self, key: &str) -> Option<String> {
        self.slots.get(key).map(|owner| owner.to_string())
    }
}

impl Default for LockStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Run lock whose slot lives in a shared [`LockStore`]
#[derive(Clone)]
pub struct TtlLock {
    store: LockStore,
    key: String,
    owner: String,
}

impl TtlLock {
    pub fn new(store: LockStore, key: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            owner: owner.into(),
        }
    }

    /// Lock on [`WAIT_TIME_MONITOR_LOCK_KEY`]
    pub fn wait_time_monitor(store: LockStore, owner: impl Into<String>) -> Self {
        Self::new(store, WAIT_TIME_MONITOR_LOCK_KEY, owner)
    }
}

impl ExclusiveRunLock for TtlLock {
    fn try_acquire(&self) -> bool {
        let acquired = self.store.set_if_absent(&self.key, &self.owner);
        if !acquired {
            tracing::debug!(
                key = %self.key,
                owner = %self.owner,
                holder = ?self.store.owner(&self.key),
                "Run lock held elsewhere"
            );
        }
        acquired
    }
}

/// Run lock backed by an exclusively created file.
///
/// The file's modification time starts the slot; once it is older than the
/// TTL any contender may take the slot over. Every process pointing at the
/// same path (on a filesystem they all see) contends for one slot.
#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
    ttl: Duration,
    owner: String,
}

impl FileLock {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration, owner: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ttl,
            owner: owner.into(),
        }
    }

    /// Lock file [`LOCK_FILE_NAME`] in the same directory as `file`
    pub fn beside(file: &Path, ttl: Duration, owner: impl Into<String>) -> Self {
        Self::new(file.with_file_name(LOCK_FILE_NAME), ttl, owner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Owner recorded in the current lock file
    pub fn holder(&self) -> Option<String> {
        std::fs::read_to_string(&self.path)
            .ok()
            .map(|raw| raw.trim().to_string())
    }

    fn create(&self) -> io::Result<bool> {
        match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(mut file) => {
                writeln!(file, "{}", self.owner)?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn is_stale(&self, path: &Path) -> io::Result<bool> {
        let modified = std::fs::metadata(path)?.modified()?;
        // A modification time in the future counts as fresh
        Ok(modified
            .elapsed()
            .map(|age| age >= self.ttl)
            .unwrap_or(false))
    }

    /// Replace an expired lock file.
    ///
    /// The old file is renamed aside first so only one contender can claim
    /// it. If the claimed file turns out to be fresh (another contender
    /// replaced it in between), it is linked back and the slot is lost.
    fn take_over_stale(&self) -> io::Result<bool> {
        match self.is_stale(&self.path) {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(e) if e.kind() == ErrorKind::NotFound => return self.create(),
            Err(e) => return Err(e),
        }

        let claimed = self.path.with_extension(format!(
            "stale.{}.{}",
            std::process::id(),
            CLAIM_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        if let Err(e) = std::fs::rename(&self.path, &claimed) {
            return if e.kind() == ErrorKind::NotFound {
                Ok(false)
            } else {
                Err(e)
            };
        }

        if !self.is_stale(&claimed).unwrap_or(false) {
            let _ = std::fs::hard_link(&claimed, &self.path);
            let _ = std::fs::remove_file(&claimed);
            return Ok(false);
        }

        std::fs::remove_file(&claimed)?;
        self.create()
    }
}

impl ExclusiveRunLock for FileLock {
    fn try_acquire(&self) -> bool {
        let result = match self.create() {
            Ok(true) => Ok(true),
            Ok(false) => self.take_over_stale(),
            Err(e) => Err(e),
        };

        match result {
            Ok(acquired) => {
                if !acquired {
                    tracing::debug!(
                        path = %self.path.display(),
                        owner = %self.owner,
                        holder = ?self.holder(),
                        "Run lock file held elsewhere"
                    );
                }
                acquired
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Run lock file unavailable, skipping cycle"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_first_contender_wins() {
        let store = LockStore::new();
        let worker_a = TtlLock::wait_time_monitor(store.clone(), "worker-a");
        let worker_b = TtlLock::wait_time_monitor(store.clone(), "worker-b");

        assert!(worker_a.try_acquire());
        assert!(!worker_b.try_acquire());
        assert!(!worker_a.try_acquire());
        assert_eq!(
            store.owner(WAIT_TIME_MONITOR_LOCK_KEY),
            Some("worker-a".to_string())
        );
    }

    #[test]
    fn test_keys_are_independent() {
        let store = LockStore::new();
        let waits = TtlLock::new(store.clone(), "monitor:waits", "worker-a");
        let other = TtlLock::new(store, "monitor:other", "worker-a");

        assert!(waits.try_acquire());
        assert!(other.try_acquire());
    }

    #[test]
    fn test_slot_expires_after_ttl() {
        let store = LockStore::with_ttl(Duration::from_millis(20));
        let lock = TtlLock::wait_time_monitor(store, "worker-a");

        assert!(lock.try_acquire());
        std::thread::sleep(Duration::from_millis(200));
        assert!(lock.try_acquire());
    }

    #[test]
    fn test_concurrent_contenders_single_winner() {
        let store = LockStore::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let lock = TtlLock::wait_time_monitor(store.clone(), format!("worker-{}", i));
                std::thread::spawn(move || lock.try_acquire())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_file_lock_single_winner_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let waits = dir.path().join("wait-times.json");
        let daemon_a = FileLock::beside(&waits, DEFAULT_LOCK_TTL, "daemon-a");
        let daemon_b = FileLock::beside(&waits, DEFAULT_LOCK_TTL, "daemon-b");

        assert_eq!(daemon_a.path(), dir.path().join(LOCK_FILE_NAME));
        assert!(daemon_a.try_acquire());
        assert!(!daemon_b.try_acquire());
        assert!(!daemon_a.try_acquire());
        assert_eq!(daemon_b.holder(), Some("daemon-a".to_string()));
    }

    #[test]
    fn test_file_lock_expires_after_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);
        let daemon_a = FileLock::new(&path, Duration::from_millis(50), "daemon-a");
        let daemon_b = FileLock::new(&path, Duration::from_millis(50), "daemon-b");

        assert!(daemon_a.try_acquire());
        assert!(!daemon_b.try_acquire());

        std::thread::sleep(Duration::from_millis(300));
        assert!(daemon_b.try_acquire());
        assert!(!daemon_a.try_acquire());
        assert_eq!(daemon_a.holder(), Some("daemon-b".to_string()));

        // Nothing left behind from the takeover
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_file_lock_concurrent_contenders_single_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCK_FILE_NAME);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let lock = FileLock::new(&path, DEFAULT_LOCK_TTL, format!("daemon-{}", i));
                std::thread::spawn(move || lock.try_acquire())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn test_file_lock_missing_directory_is_not_acquired() {
        let lock = FileLock::new("/nonexistent/waitwatch/monitor.lock", DEFAULT_LOCK_TTL, "daemon-a");
        assert!(!lock.try_acquire());
    }
}
