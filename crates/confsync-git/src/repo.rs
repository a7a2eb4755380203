//! The managed clone of the remote repository.
//!
//! [`CloneRepo`] binds one working tree to `{url, branch, credential}` and
//! routes every invocation through a [`GitRunner`]. Invocations that talk to
//! the remote get a fresh [`Askpass`] helper and have every other credential
//! helper disabled; purely local invocations get neither.

use confsync_core::Credential;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::askpass::Askpass;
use crate::commands::{GitCommand, GitError, GitRunner, Result};

/// Name under which the remote is registered in the clone.
pub const REMOTE_NAME: &str = "origin";

/// Where the clone synchronizes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSpec {
    pub url: String,
    pub branch: String,
    pub credential: Credential,
}

/// Handle on the remote-backed working tree.
pub struct CloneRepo {
    runner: Arc<dyn GitRunner>,
    root: PathBuf,
    scratch_dir: PathBuf,
    remote: RemoteSpec,
    author_email: String,
}

impl std::fmt::Debug for CloneRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloneRepo")
            .field("root", &self.root)
            .field("scratch_dir", &self.scratch_dir)
            .field("remote", &self.remote)
            .finish_non_exhaustive()
    }
}

impl CloneRepo {
    /// Create a handle for the clone at `root`.
    ///
    /// `scratch_dir` receives the short-lived credential helper directories
    /// and is the working directory of `git clone`; it is normally the
    /// store's base directory (the parent of `root`).
    pub fn new(
        runner: Arc<dyn GitRunner>,
        root: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
        remote: RemoteSpec,
        author_email: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            root: root.into(),
            scratch_dir: scratch_dir.into(),
            remote,
            author_email: author_email.into(),
        }
    }

    /// Root of the working tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Branch the clone commits to and pushes.
    pub fn branch(&self) -> &str {
        &self.remote.branch
    }

    /// The remote binding.
    pub fn remote(&self) -> &RemoteSpec {
        &self.remote
    }

    pub(crate) fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// A command running inside the clone.
    pub(crate) fn command(&self) -> GitCommand {
        GitCommand::new(&self.root)
    }

    /// A command that may contact the remote: every configured credential
    /// helper is disabled so only the askpass helper answers.
    pub(crate) fn remote_command(&self, cwd: &Path) -> GitCommand {
        GitCommand::new(cwd).args(["-c", "credential.helper="])
    }

    /// Committer identity, passed per invocation so the user's global git
    /// configuration is neither required nor modified.
    pub(crate) fn with_identity(&self, command: GitCommand) -> GitCommand {
        command.args([
            "-c".to_string(),
            format!("user.name={}", self.remote.credential.username()),
            "-c".to_string(),
            format!("user.email={}", self.author_email),
            "-c".to_string(),
            "commit.gpgsign=false".to_string(),
        ])
    }

    /// Run a local git command inside the clone.
    pub(crate) async fn git<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run(self.command().args(args)).await
    }

    /// Run a prepared local command.
    pub(crate) async fn run(&self, command: GitCommand) -> Result<String> {
        self.runner.run(&command).await
    }

    /// Run `command` with a credential helper scoped to this one invocation.
    ///
    /// The helper is removed when this returns, on success and failure alike.
    pub(crate) async fn run_remote(&self, command: GitCommand) -> Result<String> {
        let askpass =
            Askpass::create(&self.scratch_dir, &self.remote.credential).map_err(GitError::Askpass)?;
        let result = self.runner.run(&askpass.apply(command)).await;
        drop(askpass);
        result
    }

    /// Returns `true` if `reference` resolves.
    pub(crate) async fn ref_exists(&self, reference: &str) -> bool {
        self.git(["rev-parse", "--verify", "--quiet", reference])
            .await
            .is_ok()
    }

    /// Returns `true` once the current branch has at least one commit.
    pub async fn has_commit(&self) -> bool {
        self.ref_exists("HEAD").await
    }
}
