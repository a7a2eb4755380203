//! Choosing the tier a key is read from.

use serde::Serialize;
use std::io;
use std::path::PathBuf;

use confsync_core::{SourceTier, StoreMode};

use crate::paths::TierPaths;

/// What kind of entry a source is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    File,
    Directory,
}

/// An existing entry a key can be served from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub tier: SourceTier,
    pub path: PathBuf,
    pub kind: SourceKind,
}

/// The highest-precedence tier holding `paths` in `mode`, if any.
///
/// # Errors
///
/// Returns the I/O error of a tier whose existence cannot be determined
/// (anything other than "not found").
pub async fn select_source(paths: &TierPaths, mode: StoreMode) -> io::Result<Option<Source>> {
    for tier in SourceTier::candidates(mode) {
        let path = paths.for_tier(tier);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err),
        };
        let kind = if metadata.is_dir() {
            SourceKind::Directory
        } else {
            SourceKind::File
        };
        return Ok(Some(Source { tier, path, kind }));
    }
    Ok(None)
}
