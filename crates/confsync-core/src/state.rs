//! Synchronization mode and the state snapshot returned by every store
//! operation.
//!
//! Transitions:
//!
//! ```text
//!   (start) LOCAL ──bring-up ok──────────────▶ ACTIVE ◀──push ok──┐
//!      │                                         │                │
//!      ├─missing credentials─▶ LOCAL (terminal)  └──push failed──▶ DEGRADED
//!      └─bring-up failed─────▶ LOCAL                  pull failed ─┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// StoreMode
// ---------------------------------------------------------------------------

/// How the store is currently persisting writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StoreMode {
    /// Local tiers only. Either no remote is configured or bring-up failed.
    #[default]
    Local,
    /// The last synchronization fully succeeded.
    Active,
    /// A write landed locally but remote synchronization is failing.
    Degraded,
}

impl StoreMode {
    /// Returns the canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "LOCAL",
            Self::Active => "ACTIVE",
            Self::Degraded => "DEGRADED",
        }
    }

    /// Returns `true` for [`StoreMode::Local`].
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local)
    }
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StoreState
// ---------------------------------------------------------------------------

/// Snapshot of the store's synchronization state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreState {
    pub mode: StoreMode,
    /// A change exists locally that has not been durably pushed.
    pub pending: bool,
    /// Message of the most recent failure, cleared by the next successful push.
    pub error: Option<String>,
    pub branch: String,
}

impl StoreState {
    /// The pre-initialization state: LOCAL, nothing pending, no error.
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            mode: StoreMode::Local,
            pending: false,
            error: None,
            branch: branch.into(),
        }
    }

    /// Fall back to local-only persistence with the reason recorded.
    pub fn enter_local(&mut self, reason: impl Into<String>) {
        self.mode = StoreMode::Local;
        self.pending = false;
        self.error = Some(reason.into());
    }

    /// A synchronization fully succeeded.
    pub fn mark_active(&mut self) {
        self.mode = StoreMode::Active;
        self.pending = false;
        self.error = None;
    }

    /// Remote synchronization failed; the change is kept locally and retried
    /// by the next write.
    pub fn mark_degraded(&mut self, error: impl Into<String>) {
        self.mode = StoreMode::Degraded;
        self.pending = true;
        self.error = Some(error.into());
    }

    /// Record a failure without changing mode (e.g. a push attempt that will
    /// still be retried).
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    /// A write finished in LOCAL mode; nothing can be pending there.
    pub fn settle_local_write(&mut self) {
        if self.mode.is_local() {
            self.pending = false;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
