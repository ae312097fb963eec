//! Advisory per-database operation lock.
//!
//! Checkout, export and bulk population each hold the lock of the data file
//! they read from for their whole run, so at most one such operation is
//! active per database. A second attempt fails fast with `LockError::Locked`.
//!
//! Uses the `fs2` crate for cross-platform file locking. The lock lives in a
//! sidecar `<db>.lock` file; a JSON note next to it records the holder.

use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from lock operations.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Another operation is already running on {}{}", path.display(), holder_suffix(holder))]
    Locked {
        path: PathBuf,
        holder: Option<LockHolder>,
    },

    #[error("Failed to create lock file: {0}")]
    CreateFailed(#[source] io::Error),

    #[error("Failed to acquire lock: {0}")]
    AcquireFailed(#[source] io::Error),
}

fn holder_suffix(holder: &Option<LockHolder>) -> String {
    match holder {
        Some(h) => format!(" ({} by pid {} since {})", h.operation, h.pid, h.timestamp),
        None => String::new(),
    }
}

/// Who holds a lock, as recorded in the sidecar note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    pub pid: u32,
    pub operation: String,
    pub timestamp: String,
}

/// Get the lock file path for a database path.
///
/// Examples:
/// - `/data/survey.ddb` → `/data/survey.ddb.lock`
/// - `/data/survey` → `/data/survey.lock`
pub fn lock_path_for(db_path: &Path) -> PathBuf {
    let mut lock_path = db_path.to_path_buf();
    match lock_path.extension() {
        Some(ext) => {
            let new_ext = format!("{}.lock", ext.to_string_lossy());
            lock_path.set_extension(new_ext);
        }
        None => {
            lock_path.set_extension("lock");
        }
    }
    lock_path
}

fn holder_path_for(lock_path: &Path) -> PathBuf {
    let mut name = lock_path.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

/// An exclusive operation lock on one database. Released on drop.
pub struct OperationLock {
    _file: File,
    lock_path: PathBuf,
    holder_path: Option<PathBuf>,
}

impl OperationLock {
    /// Try to take the lock for `db_path` without waiting.
    pub fn try_acquire(db_path: &Path, operation: &str) -> Result<Self, LockError> {
        let lock_path = lock_path_for(db_path);
        debug!(lock = %lock_path.display(), operation, "Attempting to acquire operation lock");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(LockError::CreateFailed)?;

        // Fully qualified: newer std has its own File::try_lock_exclusive.
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                info!(lock = %lock_path.display(), operation, "Acquired operation lock");
                let holder_path = write_holder(&lock_path, operation);
                Ok(Self {
                    _file: file,
                    lock_path,
                    holder_path,
                })
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(LockError::Locked {
                path: db_path.to_path_buf(),
                holder: read_holder(&lock_path),
            }),
            Err(e) => Err(LockError::AcquireFailed(e)),
        }
    }

    /// Get the path to the lock file.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for OperationLock {
    fn drop(&mut self) {
        debug!(lock = %self.lock_path.display(), "Releasing operation lock");
        if let Some(path) = &self.holder_path {
            if let Err(e) = fs::remove_file(path) {
                debug!("Failed to remove lock note {}: {}", path.display(), e);
            }
        }
        // The OS lock goes away when the file handle closes.
    }
}

impl std::fmt::Debug for OperationLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationLock")
            .field("lock_path", &self.lock_path)
            .finish()
    }
}

fn write_holder(lock_path: &Path, operation: &str) -> Option<PathBuf> {
    let holder = LockHolder {
        pid: std::process::id(),
        operation: operation.to_string(),
        timestamp: Utc::now().to_rfc3339(),
    };
    let holder_path = holder_path_for(lock_path);
    match serde_json::to_vec_pretty(&holder)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        .and_then(|payload| fs::write(&holder_path, payload))
    {
        Ok(()) => Some(holder_path),
        Err(e) => {
            warn!("Failed to write lock note {}: {}", holder_path.display(), e);
            None
        }
    }
}

fn read_holder(lock_path: &Path) -> Option<LockHolder> {
    let raw = fs::read(holder_path_for(lock_path)).ok()?;
    serde_json::from_slice(&raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_for() {
        assert_eq!(
            lock_path_for(Path::new("/data/survey.ddb")),
            PathBuf::from("/data/survey.ddb.lock")
        );
        assert_eq!(
            lock_path_for(Path::new("/data/survey")),
            PathBuf::from("/data/survey.lock")
        );
        assert_eq!(
            lock_path_for(Path::new("/data/my.survey.ddb")),
            PathBuf::from("/data/my.survey.ddb.lock")
        );
    }

    #[test]
    fn test_second_acquire_is_refused() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("survey.ddb");

        let _held = OperationLock::try_acquire(&db_path, "checkout").unwrap();
        let second = OperationLock::try_acquire(&db_path, "export");

        match second {
            Err(LockError::Locked { holder, .. }) => {
                let holder = holder.expect("holder note should be readable");
                assert_eq!(holder.operation, "checkout");
                assert_eq!(holder.pid, std::process::id());
            }
            other => panic!("expected Locked, got {:?}", other),
        }
    }

    #[test]
    fn test_release_on_drop() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("survey.ddb");

        let guard = OperationLock::try_acquire(&db_path, "checkout").unwrap();
        let note = holder_path_for(guard.lock_path());
        assert!(note.exists());
        drop(guard);
        assert!(!note.exists());

        let _again = OperationLock::try_acquire(&db_path, "checkout").unwrap();
    }

    #[test]
    fn test_debug_shows_lock_path() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("survey.ddb");

        let guard = OperationLock::try_acquire(&db_path, "checkout").unwrap();
        let rendered = format!("{:?}", guard);
        assert!(rendered.starts_with("OperationLock"));
        assert!(rendered.contains("survey.ddb.lock"));
    }
}
