//! Inputs and reports of multi-key operations.

use serde::Serialize;
use std::path::PathBuf;

use confsync_core::{StoreState, TrackedKey};

use crate::error::Result;
use crate::paths::TierPaths;

/// A batch of changes synchronized with one pull, one commit and one push.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncAllRequest {
    /// Structured documents written as pretty-printed JSON.
    pub documents: Vec<(TrackedKey, serde_json::Value)>,
    /// Files copied verbatim from their working location.
    pub files: Vec<TrackedKey>,
    /// Directories copied verbatim from their working location.
    pub directories: Vec<TrackedKey>,
}

impl SyncAllRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidKey`](crate::StoreError::InvalidKey) if
    /// `key` is not a valid key.
    pub fn document(mut self, key: &str, value: serde_json::Value) -> Result<Self> {
        self.documents.push((TrackedKey::new(key)?, value));
        Ok(self)
    }

    /// Add a file already present at its working location.
    ///
    /// # Errors
    ///
    /// See [`SyncAllRequest::document`].
    pub fn file(mut self, key: &str) -> Result<Self> {
        self.files.push(TrackedKey::new(key)?);
        Ok(self)
    }

    /// Add a directory already present at its working location.
    ///
    /// # Errors
    ///
    /// See [`SyncAllRequest::document`].
    pub fn directory(mut self, key: &str) -> Result<Self> {
        self.directories.push(TrackedKey::new(key)?);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.files.is_empty() && self.directories.is_empty()
    }
}

/// One tracked key and where it lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyStatus {
    pub key: TrackedKey,
    #[serde(flatten)]
    pub paths: TierPaths,
}

/// Everything `status` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStatus {
    #[serde(flatten)]
    pub state: StoreState,
    /// Whether the first operation has run.
    pub initialized: bool,
    pub base_dir: PathBuf,
    pub clone_dir: PathBuf,
    pub keys: Vec<KeyStatus>,
}
