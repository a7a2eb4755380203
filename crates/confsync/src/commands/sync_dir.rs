//! `confsync sync-dir` -- propagate a working directory to the store.

use anyhow::{Context, Result};

use crate::cli::SyncDirArgs;
use crate::context::RuntimeContext;
use crate::output::print_state;

/// Execute the `confsync sync-dir` command.
pub async fn run(ctx: &RuntimeContext, args: &SyncDirArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let state = store
        .sync_directory(&args.key)
        .await
        .with_context(|| format!("failed to synchronize '{}'", args.key))?;
    print_state(ctx.json, &state);
    Ok(())
}
