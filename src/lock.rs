//! Exclusive lock on the vector index.
//!
//! Indexing rewrites the whole collection, so two indexers must never run
//! against the same index at the same time. The lock is an fs2 advisory lock
//! on a sibling `<index_dir>.lock` file. The file itself is left in place
//! on release; only the lock is dropped.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Lock guard held while the index is being written.
pub struct IndexLock {
    path: PathBuf,
    lock_file: Option<File>,
}

impl IndexLock {
    /// Lock file path used for an index directory.
    pub fn lock_path(index_dir: &Path) -> PathBuf {
        let mut name = index_dir
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "index".into());
        name.push(".lock");
        index_dir.with_file_name(name)
    }

    /// Acquire an exclusive lock on the index.
    pub fn acquire(index_dir: &Path) -> Result<Self> {
        let path = Self::lock_path(index_dir);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::LockError(format!("Failed to open lock file: {}", e)))?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "Index lock acquired");
                Ok(Self {
                    path,
                    lock_file: Some(lock_file),
                })
            }
            Err(_) => {
                warn!(
                    path = %path.display(),
                    "Another indexer holds the index lock; wait for it to finish"
                );
                Err(Error::IndexLocked)
            }
        }
    }

    /// Release the lock manually
    pub fn release(&mut self) {
        if let Some(file) = self.lock_file.take() {
            if let Err(e) = file.unlock() {
                warn!(path = %self.path.display(), "Failed to unlock index: {}", e);
            }
            debug!(path = %self.path.display(), "Index lock released");
        }
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        self.release();
    }
}
