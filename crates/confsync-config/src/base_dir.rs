//! Discovery and creation of the store's base directory.
//!
//! The base directory holds the local mirror of every tracked key at its top
//! level, the remote clone in a subdirectory, the optional `confsync.yaml`,
//! and the lock file.

use crate::settings::ConfigError;
use std::path::{Path, PathBuf};

/// Directory name used under the platform data directory.
const BASE_DIR_NAME: &str = "confsync";

/// Fallback used when the platform has no data directory.
const FALLBACK_BASE_DIR: &str = ".confsync";

/// The default base directory: `<data dir>/confsync`, or `./.confsync` when
/// the platform data directory is unknown.
///
/// # Examples
///
/// ```no_run
/// use confsync_config::base_dir::default_base_dir;
///
/// println!("Store lives in {}", default_base_dir().display());
/// ```
pub fn default_base_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(BASE_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(FALLBACK_BASE_DIR))
}

/// Ensure the base directory exists, returning it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if directory creation fails.
pub fn ensure_base_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    std::fs::create_dir_all(path)?;
    Ok(path.to_path_buf())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
