//! `confsync sync-all` -- several keys, one commit, one push.

use anyhow::{Context, Result, bail};
use confsync_store::SyncAllRequest;

use crate::cli::SyncAllArgs;
use crate::context::RuntimeContext;
use crate::output::print_state;

/// Execute the `confsync sync-all` command.
pub async fn run(ctx: &RuntimeContext, args: &SyncAllArgs) -> Result<()> {
    let request = build_request(args)?;
    if request.is_empty() {
        bail!("nothing to synchronize: pass at least one --doc, --file or --dir");
    }

    let store = ctx.open_store()?;
    let state = store
        .sync_all(request)
        .await
        .context("failed to synchronize keys")?;
    print_state(ctx.json, &state);
    Ok(())
}

fn build_request(args: &SyncAllArgs) -> Result<SyncAllRequest> {
    let mut request = SyncAllRequest::new();
    for (key, path) in &args.documents {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let value = serde_json::from_str(&text)
            .with_context(|| format!("{} is not valid JSON", path.display()))?;
        request.documents.push((key.clone(), value));
    }
    request.files.extend(args.files.iter().cloned());
    request.directories.extend(args.directories.iter().cloned());
    Ok(request)
}
