//! # Data Directory Locking
//!
//! Two node processes pointed at the same data directory would interleave
//! whole-file rewrites and corrupt the chain. An exclusive `fs2` file lock
//! (flock on Unix, LockFile on Windows) keeps the second process out.

use fs2::FileExt;
use shared_types::StorageError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

const LOCK_FILE: &str = "LOCK";

/// Exclusive lock on a ledger data directory.
///
/// Acquired before the file stores are opened; released on drop (RAII).
pub struct StoreLock {
    /// Kept open to hold the flock.
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Acquire an exclusive lock on `data_dir`.
    ///
    /// Fails with [`StorageError::Locked`] when another process holds it.
    pub fn acquire(data_dir: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(LOCK_FILE);

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            let holder = Self::read_holder_pid(&path);
            warn!(
                path = %path.display(),
                holder_pid = ?holder,
                "Data directory is locked by another process"
            );
            return Err(StorageError::Locked);
        }

        let mut file = file;
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_holder_pid(path: &Path) -> Option<u32> {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}
