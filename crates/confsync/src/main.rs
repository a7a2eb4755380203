//! `confsync` -- configuration files mirrored to a git remote.
//!
//! Parses CLI arguments with clap, resolves the runtime context, and
//! dispatches to command handlers.

mod cli;
mod commands;
mod context;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use context::RuntimeContext;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let ctx = RuntimeContext::from_global_args(&cli.global);

    // Warnings (tolerated git steps, degraded pushes) always reach stderr;
    // `-v` or RUST_LOG widens the filter.
    let default_filter = if ctx.verbose {
        "confsync=debug"
    } else {
        "confsync=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(ctx.verbose)
        .init();

    let result = match cli.command {
        Some(Commands::Init(args)) => commands::init::run(&ctx, &args).await,
        Some(Commands::Materialize(args)) => commands::materialize::run(&ctx, &args).await,
        Some(Commands::Read(args)) => commands::read::run(&ctx, &args).await,
        Some(Commands::Write(args)) => commands::write::run(&ctx, &args).await,
        Some(Commands::SyncDir(args)) => commands::sync_dir::run(&ctx, &args).await,
        Some(Commands::SyncAll(args)) => commands::sync_all::run(&ctx, &args).await,
        Some(Commands::Status) => commands::status::run(&ctx),
        Some(Commands::Completion(args)) => commands::completion::run(&ctx, &args),
        None => {
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        if cli.global.json {
            let err_json = serde_json::json!({
                "error": format!("{:#}", e),
            });
            if let Ok(s) = serde_json::to_string_pretty(&err_json) {
                eprintln!("{}", s);
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}
