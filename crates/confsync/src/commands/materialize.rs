//! `confsync materialize` -- copy the best source of keys into every tier.

use anyhow::{Context, Result};

use crate::cli::MaterializeArgs;
use crate::context::RuntimeContext;
use crate::output::print_state;

/// Execute the `confsync materialize` command.
pub async fn run(ctx: &RuntimeContext, args: &MaterializeArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let state = store
        .materialize(&args.keys)
        .await
        .context("failed to materialize keys")?;
    print_state(ctx.json, &state);
    Ok(())
}
