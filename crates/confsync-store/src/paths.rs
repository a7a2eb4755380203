//! Mapping keys to their three storage locations.

use serde::Serialize;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use confsync_config::settings::SETTINGS_FILE_NAME;
use confsync_core::{KeyError, SourceTier, TrackedKey};
use confsync_lockfile::LOCK_FILE_NAME;

/// Suffix of the bundled default next to a working location.
pub const EXAMPLE_SUFFIX: &str = ".example";

const GIT_DIR: &str = ".git";

/// Resolves keys against the working directory, the base directory (local
/// mirror) and the remote clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    working_dir: PathBuf,
    base_dir: PathBuf,
    clone_dir: PathBuf,
    clone_dir_name: String,
}

/// The locations of one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierPaths {
    /// Where the caller reads and writes.
    pub working: PathBuf,
    /// Durable local-only copy.
    pub mirror: PathBuf,
    /// Location inside the remote clone.
    pub clone: PathBuf,
}

impl PathResolver {
    pub fn new(
        working_dir: impl Into<PathBuf>,
        base_dir: impl Into<PathBuf>,
        clone_dir_name: &str,
    ) -> Self {
        let base_dir = base_dir.into();
        Self {
            working_dir: working_dir.into(),
            clone_dir: base_dir.join(clone_dir_name),
            clone_dir_name: clone_dir_name.to_string(),
            base_dir,
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn clone_dir(&self) -> &Path {
        &self.clone_dir
    }

    /// Reject keys whose mirror or clone location would overwrite the
    /// clone itself, git metadata, the settings file or the lock file.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError::Reserved`] naming the colliding entry.
    pub fn check(&self, key: &TrackedKey) -> Result<(), KeyError> {
        let relative = key.relative_path();
        let names: Vec<&OsStr> = relative.iter().collect();
        let reserved = if names.iter().any(|name| *name == GIT_DIR) {
            Some(GIT_DIR)
        } else if names.first() == Some(&OsStr::new(&self.clone_dir_name)) {
            Some(self.clone_dir_name.as_str())
        } else if names.len() == 1 {
            [SETTINGS_FILE_NAME, LOCK_FILE_NAME]
                .into_iter()
                .find(|name| names[0] == *name)
        } else {
            None
        };

        match reserved {
            Some(name) => Err(KeyError::Reserved {
                key: key.to_string(),
                name: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Locations of `key`.
    ///
    /// An absolute key is used as-is for the working tier and stored under
    /// its file name in the mirror and the clone.
    pub fn resolve(&self, key: &TrackedKey) -> TierPaths {
        let relative = key.relative_path();
        let working = if key.is_absolute() {
            key.as_path().to_path_buf()
        } else {
            self.working_dir.join(&relative)
        };
        TierPaths {
            working,
            mirror: self.base_dir.join(&relative),
            clone: self.clone_dir.join(&relative),
        }
    }
}

impl TierPaths {
    /// The `<working>.example` default.
    pub fn example(&self) -> PathBuf {
        let mut path = OsString::from(self.working.as_os_str());
        path.push(EXAMPLE_SUFFIX);
        PathBuf::from(path)
    }

    /// The location a read from `tier` would use.
    pub fn for_tier(&self, tier: SourceTier) -> PathBuf {
        match tier {
            SourceTier::RemoteClone => self.clone.clone(),
            SourceTier::LocalMirror => self.mirror.clone(),
            SourceTier::Example => self.example(),
        }
    }
}
