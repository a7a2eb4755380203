//! Configuration management for the confsync configuration store.
//!
//! This crate loads [`StoreSettings`] from defaults, an optional
//! `confsync.yaml` in the base directory, and `CONFSYNC_*` environment
//! variables, and knows where the base directory lives.

pub mod base_dir;
pub mod settings;

pub use base_dir::{default_base_dir, ensure_base_dir};
pub use settings::{ConfigError, RemoteSettings, Result, StoreSettings};
