//! Git integration for the confsync configuration store.
//!
//! This crate wraps the `git` binary behind the [`GitRunner`] trait and
//! builds the store's remote protocol on top of it:
//!
//! - [`askpass`]: an ephemeral credential helper so tokens never appear in
//!   argument lists,
//! - [`lifecycle`]: clone-or-adopt, fetch, checkout and rebase-pull,
//! - [`commit`]: staging and single-snapshot commits,
//! - [`push`]: force-push with a bounded, fixed-delay retry.

pub mod askpass;
pub mod commands;
pub mod commit;
pub mod gitdir;
pub mod lifecycle;
pub mod push;
pub mod repo;

#[cfg(test)]
mod test_support;

pub use askpass::Askpass;
pub use commands::{GitCommand, GitError, GitRunner, Result, SystemGit};
pub use commit::CommitOutcome;
pub use lifecycle::{BringUpReport, CheckoutOutcome, Preparation, StepOutcome};
pub use push::{PushOutcome, RetryPolicy};
pub use repo::{CloneRepo, RemoteSpec};
