//! Tracked keys -- logical paths the store materializes and synchronizes.
//!
//! A key names a file or directory relative to the caller's working
//! directory (or an absolute path for the working tier only). The set of
//! tracked keys only ever grows during a process lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced when a raw string cannot be used as a tracked key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// The key was empty or whitespace only.
    #[error("key must not be empty")]
    Empty,

    /// The key contains a `..` component and would escape its root.
    #[error("key '{0}' must not contain '..' components")]
    ParentTraversal(String),

    /// The key does not end in a file or directory name (e.g. `"."` or `"/"`).
    #[error("key '{0}' does not name a file or directory")]
    NoFileName(String),

    /// The key would overlap a file or directory the store manages itself.
    #[error("key '{key}' collides with the store's own '{name}'")]
    Reserved { key: String, name: String },
}

// ---------------------------------------------------------------------------
// TrackedKey
// ---------------------------------------------------------------------------

/// A validated logical path known to the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackedKey(String);

impl TrackedKey {
    /// Validate and wrap a raw key.
    ///
    /// Surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns a [`KeyError`] if the key is empty, contains `..`, or has no
    /// final file name.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, KeyError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(KeyError::Empty);
        }

        let path = Path::new(trimmed);
        if path
            .components()
            .any(|component| matches!(component, Component::ParentDir))
        {
            return Err(KeyError::ParentTraversal(trimmed.to_string()));
        }
        if path.file_name().is_none() {
            return Err(KeyError::NoFileName(trimmed.to_string()));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Returns the key as it was given (trimmed).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the key as a path.
    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Returns `true` if the key is an absolute path.
    pub fn is_absolute(&self) -> bool {
        self.as_path().is_absolute()
    }

    /// The path of this key below a store-managed root (local mirror or
    /// remote clone).
    ///
    /// Relative keys keep their structure minus any `./` components.
    /// Absolute keys collapse to their final file name.
    pub fn relative_path(&self) -> PathBuf {
        let path = self.as_path();
        if path.is_absolute() {
            // file_name() is guaranteed by construction.
            return path.file_name().map(PathBuf::from).unwrap_or_default();
        }
        path.components()
            .filter(|component| matches!(component, Component::Normal(_)))
            .collect()
    }

    /// The first component of [`relative_path`](Self::relative_path).
    pub fn root_component(&self) -> Option<String> {
        self.relative_path()
            .components()
            .next()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
    }
}

impl fmt::Display for TrackedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TrackedKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TrackedKey {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for TrackedKey {
    type Error = KeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TrackedKey> for String {
    fn from(key: TrackedKey) -> Self {
        key.0
    }
}

impl AsRef<Path> for TrackedKey {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

// ---------------------------------------------------------------------------
// TrackedKeys
// ---------------------------------------------------------------------------

/// An insertion-ordered, deduplicated set of tracked keys.
///
/// There is no removal: the set grows monotonically for the lifetime of the
/// owning store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedKeys {
    keys: Vec<TrackedKey>,
}

impl TrackedKeys {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key, returning `true` if it was not already tracked.
    pub fn insert(&mut self, key: TrackedKey) -> bool {
        if self.keys.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    /// Add every key from `keys`, returning how many were new.
    pub fn extend<I>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = TrackedKey>,
    {
        keys.into_iter().filter(|key| self.insert(key.clone())).count()
    }

    /// Returns `true` if `key` is tracked.
    pub fn contains(&self, key: &TrackedKey) -> bool {
        self.keys.contains(key)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, TrackedKey> {
        self.keys.iter()
    }

    /// Copy the keys out in insertion order.
    pub fn to_vec(&self) -> Vec<TrackedKey> {
        self.keys.clone()
    }
}

impl FromIterator<TrackedKey> for TrackedKeys {
    fn from_iter<I: IntoIterator<Item = TrackedKey>>(iter: I) -> Self {
        let mut keys = Self::new();
        keys.extend(iter);
        keys
    }
}

impl<'a> IntoIterator for &'a TrackedKeys {
    type Item = &'a TrackedKey;
    type IntoIter = std::slice::Iter<'a, TrackedKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
