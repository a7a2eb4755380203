//! Runtime context for command execution.

use std::path::PathBuf;

use anyhow::{Context, Result};
use confsync_config::StoreSettings;
use confsync_store::ConfigStore;

use crate::cli::GlobalArgs;

/// Runtime context passed to every command handler.
///
/// Constructed once in `main` after CLI parsing, before command dispatch.
#[derive(Debug)]
pub struct RuntimeContext {
    /// Base directory override from `--base-dir`.
    pub base_dir: Option<PathBuf>,

    /// Working directory override from `--working-dir`.
    pub working_dir: Option<PathBuf>,

    /// Whether to produce JSON output.
    pub json: bool,

    /// Verbose output.
    pub verbose: bool,
}

impl RuntimeContext {
    /// Build a `RuntimeContext` from parsed global arguments.
    pub fn from_global_args(global: &GlobalArgs) -> Self {
        Self {
            base_dir: global.base_dir.clone(),
            working_dir: global.working_dir.clone(),
            json: global.json,
            verbose: global.verbose,
        }
    }

    /// Resolve settings from defaults, `confsync.yaml`, the environment and
    /// the command-line overrides, in increasing priority.
    pub fn settings(&self) -> Result<StoreSettings> {
        let mut settings = StoreSettings::load_with(self.base_dir.as_deref())
            .context("failed to load confsync settings")?;
        if let Some(dir) = &self.working_dir {
            settings.working_dir = Some(dir.clone());
        }
        Ok(settings)
    }

    /// Open the store described by [`settings`](Self::settings).
    pub fn open_store(&self) -> Result<ConfigStore> {
        let settings = self.settings()?;
        let base_dir = settings.base_dir();
        tracing::debug!(base_dir = %base_dir.display(), remote = settings.remote().is_some(), "opening store");
        ConfigStore::open(settings)
            .with_context(|| format!("failed to open store at {}", base_dir.display()))
    }
}
