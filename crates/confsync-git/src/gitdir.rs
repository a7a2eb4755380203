//! Filesystem checks on the clone directory.
//!
//! These decide how the remote clone is brought into existence: a directory
//! with `.git` metadata is reused, an empty (or missing) one is cloned into,
//! and a non-empty one without metadata is adopted in place.

use std::io;
use std::path::Path;

/// Name of the version-control metadata entry.
const GIT_DIR_NAME: &str = ".git";

/// Returns `true` if `dir` contains `.git` (a directory, or a file as used by
/// worktrees and submodules).
///
/// This does **not** shell out to `git`.
pub async fn has_git_metadata(dir: &Path) -> bool {
    tokio::fs::try_exists(dir.join(GIT_DIR_NAME))
        .await
        .unwrap_or(false)
}

/// Returns `true` if `dir` does not exist or has no entries.
///
/// # Errors
///
/// Returns the underlying error if `dir` exists but cannot be listed.
pub async fn is_empty_or_missing(dir: &Path) -> io::Result<bool> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(err) => return Err(err),
    };
    Ok(entries.next_entry().await?.is_none())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
