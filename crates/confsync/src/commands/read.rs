//! `confsync read` -- print the content of a key.

use std::io::Write;

use anyhow::{Context, Result};

use crate::cli::ReadArgs;
use crate::context::RuntimeContext;
use crate::output::output_json;

/// Execute the `confsync read` command.
///
/// The document is always printed as JSON; `--raw` bypasses parsing and
/// writes the stored bytes unchanged.
pub async fn run(ctx: &RuntimeContext, args: &ReadArgs) -> Result<()> {
    let store = ctx.open_store()?;

    if args.raw {
        let bytes = store
            .read_raw(&args.key)
            .await
            .with_context(|| format!("failed to read '{}'", args.key))?;
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        handle.write_all(&bytes)?;
        handle.flush()?;
        return Ok(());
    }

    let value = store
        .read(&args.key)
        .await
        .with_context(|| format!("failed to read '{}'", args.key))?;
    output_json(&value);
    Ok(())
}
