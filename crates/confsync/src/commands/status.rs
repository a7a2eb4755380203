//! `confsync status` -- show state and tracked keys.

use anyhow::Result;

use crate::context::RuntimeContext;
use crate::output::print_status;

/// Execute the `confsync status` command.
///
/// Never initializes the store, so no git command runs.
pub fn run(ctx: &RuntimeContext) -> Result<()> {
    let store = ctx.open_store()?;
    print_status(ctx.json, &store.status());
    Ok(())
}
