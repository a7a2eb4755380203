//! Core types for the confsync configuration store.
//!
//! This crate contains the domain model shared by every other crate: the
//! logical keys the store tracks, the synchronization state machine, the
//! read-source tiers, and the remote credential pair.

pub mod credential;
pub mod key;
pub mod state;
pub mod tier;

pub use credential::Credential;
pub use key::{KeyError, TrackedKey, TrackedKeys};
pub use state::{StoreMode, StoreState};
pub use tier::SourceTier;
