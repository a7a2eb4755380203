//! A file-backed configuration store mirrored to a remote git repository.
//!
//! Callers read and write named configuration artifacts (JSON documents,
//! text files, directories) through [`ConfigStore`]. Each key lives in up to
//! three tiers: the caller's working location, a local mirror in the base
//! directory, and a clone of the remote repository. Writes always land
//! locally; when a remote is configured they are also committed and
//! force-pushed, and failures only move the store between the
//! [`StoreMode`](confsync_core::StoreMode)s.

pub mod error;
pub mod fsutil;
pub mod paths;
pub mod request;
pub mod source;
pub mod store;

pub use error::{Result, StoreError};
pub use paths::{PathResolver, TierPaths};
pub use request::{KeyStatus, StoreStatus, SyncAllRequest};
pub use source::{Source, SourceKind, select_source};
pub use store::ConfigStore;

pub use confsync_core::{SourceTier, StoreMode, StoreState, TrackedKey};
