//! Advisory file locking for a confsync base directory.
//!
//! A store assumes it is the single owner of its base directory. The
//! [`StoreLock`] guard holds an exclusive `flock`-style lock on
//! `<base_dir>/.confsync.lock` for as long as it is alive, so a second
//! process opening the same directory fails fast instead of racing on the
//! shared clone.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

/// Name of the lock file inside the base directory.
pub const LOCK_FILE_NAME: &str = ".confsync.lock";

/// Errors that can occur while acquiring a lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("{} is locked by another process", path.display())]
    Held {
        /// Path of the contended lock file.
        path: PathBuf,
    },

    /// The lock file could not be created or locked.
    #[error("failed to lock {}: {source}", path.display())]
    Io {
        /// Path of the lock file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// A specialized `Result` type for locking operations.
pub type Result<T> = std::result::Result<T, LockError>;

/// An exclusive lock on a base directory, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Try to take the lock for `base_dir` without blocking.
    ///
    /// The directory is created if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Held`] if another process holds the lock, or
    /// [`LockError::Io`] if the lock file cannot be opened.
    pub fn acquire(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(LOCK_FILE_NAME);
        let io_err = |source| LockError::Io {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(base_dir).map_err(io_err)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(io_err)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { file, path }),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                Err(LockError::Held { path })
            }
            Err(err) => Err(io_err(err)),
        }
    }

    /// Path of the held lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // Unlock errors are irrelevant: closing the handle releases it anyway.
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_creates_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("store");
        let lock = StoreLock::acquire(&base).unwrap();
        assert!(lock.path().exists());
        assert_eq!(lock.path(), base.join(LOCK_FILE_NAME));
    }

    #[test]
    fn test_second_acquire_is_rejected_until_drop() {
        let dir = tempfile::tempdir().unwrap();
        let first = StoreLock::acquire(dir.path()).unwrap();

        match StoreLock::acquire(dir.path()) {
            Err(LockError::Held { path }) => assert_eq!(path, first.path()),
            other => panic!("expected Held, got: {other:?}"),
        }

        drop(first);
        assert!(StoreLock::acquire(dir.path()).is_ok());
    }
}
