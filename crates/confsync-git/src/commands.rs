//! Git command execution.
//!
//! Every git invocation the store makes is described by a [`GitCommand`]
//! and executed by a [`GitRunner`]. The production runner, [`SystemGit`],
//! spawns the `git` binary on the tokio runtime; tests substitute recording
//! fakes at the same seam.

use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur when running git commands.
#[derive(Debug, Error)]
pub enum GitError {
    /// The git binary could not be found or spawned.
    #[error("failed to execute git: {0}")]
    SpawnError(#[from] std::io::Error),

    /// The git command exited with a non-zero status.
    #[error("git {command} failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        /// The git subcommand that failed (e.g. `push`).
        command: String,
        /// The exit code, or `None` if the process was killed by a signal.
        code: Option<i32>,
        /// The content of stderr.
        stderr: String,
    },

    /// The ephemeral credential helper could not be written.
    #[error("failed to prepare credential helper: {0}")]
    Askpass(#[source] std::io::Error),

    /// The clone directory could not be inspected or created.
    #[error("failed to prepare {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A specialized `Result` type for git operations.
pub type Result<T> = std::result::Result<T, GitError>;

// ---------------------------------------------------------------------------
// GitCommand
// ---------------------------------------------------------------------------

/// A single git invocation: arguments, working directory and extra
/// environment.
#[derive(Clone, PartialEq, Eq)]
pub struct GitCommand {
    cwd: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl GitCommand {
    /// Start a command that runs in `cwd`.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Set an environment variable for the child process.
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Working directory of the invocation.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// All arguments, in order.
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Extra environment variables.
    pub fn envs(&self) -> &[(OsString, OsString)] {
        &self.envs
    }

    /// Looks up an extra environment variable by name.
    pub fn env_value(&self, key: &str) -> Option<&OsStr> {
        self.envs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_os_str())
    }

    /// The git subcommand, skipping leading `-c key=value` pairs.
    pub fn subcommand(&self) -> Option<String> {
        let mut args = self.args.iter();
        while let Some(arg) = args.next() {
            if arg == "-c" {
                args.next();
                continue;
            }
            return Some(arg.to_string_lossy().into_owned());
        }
        None
    }
}

impl fmt::Debug for GitCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Environment values are omitted: they may point at credential helpers.
        let env_keys: Vec<_> = self.envs.iter().map(|(k, _)| k).collect();
        f.debug_struct("GitCommand")
            .field("cwd", &self.cwd)
            .field("args", &self.args)
            .field("env", &env_keys)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// GitRunner
// ---------------------------------------------------------------------------

/// Executes git invocations.
#[async_trait]
pub trait GitRunner: Send + Sync {
    /// Run `command` to completion, returning trimmed stdout on success.
    ///
    /// # Errors
    ///
    /// Returns [`GitError::SpawnError`] if git cannot be started, or
    /// [`GitError::CommandFailed`] on a non-zero exit.
    async fn run(&self, command: &GitCommand) -> Result<String>;
}

/// Runs the `git` binary found on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemGit;

#[async_trait]
impl GitRunner for SystemGit {
    async fn run(&self, command: &GitCommand) -> Result<String> {
        debug!(cwd = %command.cwd().display(), args = ?command.arguments(), "git");

        let output = Command::new("git")
            .args(command.arguments())
            .envs(command.envs().iter().map(|(k, v)| (k, v)))
            .current_dir(command.cwd())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(GitError::CommandFailed {
                command: command.subcommand().unwrap_or_default(),
                code: output.status.code(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
