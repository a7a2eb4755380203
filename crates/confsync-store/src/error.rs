//! Store error types.
//!
//! Only failures that make the caller's result unusable surface here: bad
//! keys, missing content, local I/O and JSON errors. Remote and git failures
//! are absorbed into [`StoreState`](confsync_core::StoreState) instead.

use std::path::PathBuf;

use confsync_config::ConfigError;
use confsync_core::KeyError;
use confsync_lockfile::LockError;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No tier holds the key.
    #[error("no source found for {key}")]
    NotFound {
        /// The key that was looked up.
        key: String,
    },

    /// The key failed validation.
    #[error("invalid key: {0}")]
    InvalidKey(#[from] KeyError),

    /// The key names a directory where a file was required.
    #[error("{key} is a directory, not a file")]
    NotAFile {
        /// The offending key.
        key: String,
    },

    /// The key names a file where a directory was required.
    #[error("{key} is not a directory")]
    NotADirectory {
        /// The offending key.
        key: String,
    },

    /// A local filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The path being read or written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Content could not be parsed or serialized as JSON.
    #[error("invalid JSON for {key}: {source}")]
    Serialization {
        /// The key whose content was being converted.
        key: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// Another process owns the base directory.
    #[error(transparent)]
    Locked(LockError),

    /// Settings could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience alias used throughout the store crate.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Creates a [`StoreError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if this is a [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<LockError> for StoreError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Io { path, source } => Self::Io { path, source },
            held @ LockError::Held { .. } => Self::Locked(held),
        }
    }
}
