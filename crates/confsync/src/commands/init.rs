//! `confsync init` -- bring the store up and materialize tracked keys.

use anyhow::{Context, Result};

use crate::cli::InitArgs;
use crate::context::RuntimeContext;
use crate::output::print_state;

/// Execute the `confsync init` command.
///
/// A remote that cannot be reached is not an error: the store settles in
/// LOCAL mode and the reason is reported in the printed state.
pub async fn run(ctx: &RuntimeContext, args: &InitArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let state = store
        .initialize(&args.keys)
        .await
        .context("failed to initialize store")?;
    print_state(ctx.json, &state);
    Ok(())
}
