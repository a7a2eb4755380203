//! Read-source tiers and their precedence.

use serde::Serialize;
use std::fmt;

use crate::state::StoreMode;

/// A location a read may be served from.
///
/// Variant order is precedence order: the derived `Ord` ranks
/// `RemoteClone < LocalMirror < Example`, lower winning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTier {
    /// The working tree bound to the remote repository.
    RemoteClone,
    /// The durable local-only copy under the base directory.
    LocalMirror,
    /// A bundled `<key>.example` default next to the working location.
    Example,
}

impl SourceTier {
    /// All tiers, highest precedence first.
    pub const PRECEDENCE: [SourceTier; 3] = [Self::RemoteClone, Self::LocalMirror, Self::Example];

    /// Returns the kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoteClone => "remote-clone",
            Self::LocalMirror => "local-mirror",
            Self::Example => "example",
        }
    }

    /// Whether this tier may serve reads while the store is in `mode`.
    ///
    /// The remote clone is ignored in LOCAL mode.
    pub fn available_in(&self, mode: StoreMode) -> bool {
        !(matches!(self, Self::RemoteClone) && mode.is_local())
    }

    /// Tiers eligible in `mode`, highest precedence first.
    pub fn candidates(mode: StoreMode) -> impl Iterator<Item = SourceTier> {
        Self::PRECEDENCE
            .into_iter()
            .filter(move |tier| tier.available_in(mode))
    }
}

impl fmt::Display for SourceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
