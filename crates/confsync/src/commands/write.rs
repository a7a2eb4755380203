//! `confsync write` -- store a JSON document and synchronize it.

use anyhow::{Context, Result, bail};
use serde_json::Value;

use crate::cli::WriteArgs;
use crate::context::RuntimeContext;
use crate::output::print_state;

/// Execute the `confsync write` command.
pub async fn run(ctx: &RuntimeContext, args: &WriteArgs) -> Result<()> {
    let value = document(args)?;
    let store = ctx.open_store()?;
    let state = store
        .write(&args.key, &value)
        .await
        .with_context(|| format!("failed to write '{}'", args.key))?;
    print_state(ctx.json, &state);
    Ok(())
}

fn document(args: &WriteArgs) -> Result<Value> {
    let text = match (&args.value, &args.file) {
        (Some(value), _) => value.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) => bail!("either --value or --file is required"),
    };
    serde_json::from_str(&text).context("document is not valid JSON")
}
