//! Clap CLI definitions for the `confsync` command.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};
use confsync_core::TrackedKey;

/// confsync -- configuration files that follow you.
///
/// Reads and writes configuration artifacts through a local store that is
/// mirrored to a remote git repository whenever one is reachable.
#[derive(Parser, Debug)]
#[command(
    name = "confsync",
    about = "File-backed configuration store mirrored to a git remote",
    version,
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Global flags available to all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Store base directory (default: $CONFSYNC_BASE_DIR or the platform data directory).
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    /// Directory working copies are resolved against (default: current directory).
    #[arg(long, global = true)]
    pub working_dir: Option<PathBuf>,

    /// Output in JSON format.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose/debug output.
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

/// All available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bring the store up and materialize every tracked key.
    Init(InitArgs),

    /// Copy the best available source of keys into every tier.
    Materialize(MaterializeArgs),

    /// Print the content of a key.
    Read(ReadArgs),

    /// Write a JSON document and synchronize it.
    Write(WriteArgs),

    /// Synchronize a directory from its working location.
    #[command(name = "sync-dir")]
    SyncDir(SyncDirArgs),

    /// Synchronize several keys with a single commit.
    #[command(name = "sync-all")]
    SyncAll(SyncAllArgs),

    /// Show the store state and tracked keys without touching the remote.
    Status,

    /// Generate shell completion scripts.
    Completion(CompletionArgs),
}

/// Arguments for `confsync init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Extra keys to track.
    pub keys: Vec<TrackedKey>,
}

/// Arguments for `confsync materialize`.
#[derive(Args, Debug)]
pub struct MaterializeArgs {
    /// Keys to materialize (default: every tracked key).
    pub keys: Vec<TrackedKey>,
}

/// Arguments for `confsync read`.
#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Key to read.
    pub key: TrackedKey,

    /// Print the content verbatim instead of parsing it as JSON.
    #[arg(long)]
    pub raw: bool,
}

/// Arguments for `confsync write`.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("content").required(true).args(["value", "file"])))]
pub struct WriteArgs {
    /// Key to write.
    pub key: TrackedKey,

    /// JSON document given inline.
    #[arg(long)]
    pub value: Option<String>,

    /// File holding the JSON document.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

/// Arguments for `confsync sync-dir`.
#[derive(Args, Debug)]
pub struct SyncDirArgs {
    /// Directory key to synchronize.
    pub key: TrackedKey,
}

/// Arguments for `confsync sync-all`.
#[derive(Args, Debug)]
pub struct SyncAllArgs {
    /// JSON document to write, as KEY=PATH (repeatable).
    #[arg(long = "doc", value_name = "KEY=PATH", value_parser = parse_document)]
    pub documents: Vec<(TrackedKey, PathBuf)>,

    /// File key to copy from its working location (repeatable).
    #[arg(long = "file", value_name = "KEY")]
    pub files: Vec<TrackedKey>,

    /// Directory key to copy from its working location (repeatable).
    #[arg(long = "dir", value_name = "KEY")]
    pub directories: Vec<TrackedKey>,
}

/// Arguments for `confsync completion`.
#[derive(Args, Debug)]
pub struct CompletionArgs {
    #[command(subcommand)]
    pub command: CompletionCommands,
}

/// Completion subcommands.
#[derive(Subcommand, Debug)]
pub enum CompletionCommands {
    /// Generate Bash completions.
    Bash,
    /// Generate Zsh completions.
    Zsh,
    /// Generate Fish completions.
    Fish,
    /// Generate PowerShell completions.
    Powershell,
}

/// Parses `KEY=PATH`.
fn parse_document(raw: &str) -> Result<(TrackedKey, PathBuf), String> {
    let (key, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=PATH, got '{raw}'"))?;
    if path.is_empty() {
        return Err(format!("missing path for '{key}'"));
    }
    let key = TrackedKey::new(key).map_err(|err| err.to_string())?;
    Ok((key, PathBuf::from(path)))
}
