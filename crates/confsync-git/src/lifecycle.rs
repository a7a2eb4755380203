//! Bringing the clone to a usable state.
//!
//! [`CloneRepo::bring_up`] runs the fixed sequence
//! prepare → fetch → checkout → pull. Preparation and checkout are fatal on
//! failure; registering the remote, fetching and pulling are *tolerated*:
//! their failure is recorded in the [`BringUpReport`] and the sequence
//! continues.

use std::path::Path;
use tracing::{debug, info, warn};

use crate::commands::{GitError, Result};
use crate::gitdir::{has_git_metadata, is_empty_or_missing};
use crate::repo::{CloneRepo, REMOTE_NAME};

/// Result of a step whose failure does not abort bring-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed,
    /// The step failed; the message is the git error.
    Tolerated(String),
}

impl StepOutcome {
    /// Convert a step result, logging the failure.
    pub fn tolerate<T>(step: &str, result: Result<T>) -> Self {
        match result {
            Ok(_) => Self::Completed,
            Err(err) => {
                warn!(step, error = %err, "tolerated git failure");
                Self::Tolerated(err.to_string())
            }
        }
    }

    pub fn is_tolerated(&self) -> bool {
        matches!(self, Self::Tolerated(_))
    }
}

/// How the clone directory came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preparation {
    /// The directory already held a repository.
    Existing,
    /// The directory was empty or missing and the remote was cloned into it.
    Cloned,
    /// The directory had content but no repository; one was initialized in
    /// place.
    Adopted,
}

/// How the configured branch was checked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutOutcome {
    /// The local branch already existed.
    Existing,
    /// A local branch tracking the remote branch was created.
    Tracking,
    /// A new local branch was created from the current commit.
    Created,
    /// The repository has no commits; HEAD now names the branch.
    Unborn,
}

/// What happened while bringing the clone up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BringUpReport {
    pub preparation: Preparation,
    pub remote_registration: StepOutcome,
    pub fetch: StepOutcome,
    pub checkout: CheckoutOutcome,
    pub pull: StepOutcome,
}

impl BringUpReport {
    /// Messages of every tolerated failure, labelled by step.
    pub fn tolerated(&self) -> Vec<(&'static str, &str)> {
        [
            ("remote", &self.remote_registration),
            ("fetch", &self.fetch),
            ("pull", &self.pull),
        ]
        .into_iter()
        .filter_map(|(step, outcome)| match outcome {
            StepOutcome::Tolerated(message) => Some((step, message.as_str())),
            StepOutcome::Completed => None,
        })
        .collect()
    }
}

impl CloneRepo {
    /// Clone or adopt the directory, then fetch, check out the branch and
    /// rebase onto the remote.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be prepared (clone or init failure) or
    /// the branch cannot be checked out by any fallback.
    pub async fn bring_up(&self) -> Result<BringUpReport> {
        let (preparation, remote_registration) = self.prepare().await?;
        debug!(?preparation, root = %self.root().display(), "clone prepared");

        let fetch = StepOutcome::tolerate("fetch", self.fetch().await);
        let checkout = self.checkout_branch().await?;
        let pull = StepOutcome::tolerate("pull", self.pull_rebase().await);

        let report = BringUpReport {
            preparation,
            remote_registration,
            fetch,
            checkout,
            pull,
        };
        info!(
            ?preparation,
            ?checkout,
            tolerated = report.tolerated().len(),
            "clone ready"
        );
        Ok(report)
    }

    async fn prepare(&self) -> Result<(Preparation, StepOutcome)> {
        let root = self.root();
        if has_git_metadata(root).await {
            let registration = StepOutcome::tolerate("remote", self.register_remote().await);
            return Ok((Preparation::Existing, registration));
        }

        let empty = is_empty_or_missing(root)
            .await
            .map_err(|source| filesystem(root, source))?;
        if empty {
            let parent = root.parent().unwrap_or(self.scratch_dir());
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| filesystem(parent, source))?;
            let command = self
                .remote_command(parent)
                .arg("clone")
                .arg(&self.remote().url)
                .arg(root);
            self.run_remote(command).await?;
            return Ok((Preparation::Cloned, StepOutcome::Completed));
        }

        self.git(["init"]).await?;
        let registration = StepOutcome::tolerate("remote", self.register_remote().await);
        Ok((Preparation::Adopted, registration))
    }

    /// Point `origin` at the configured URL, adding it if absent.
    async fn register_remote(&self) -> Result<()> {
        let url = self.remote().url.as_str();
        match self.git(["remote", "add", REMOTE_NAME, url]).await {
            Ok(_) => Ok(()),
            Err(_) => self
                .git(["remote", "set-url", REMOTE_NAME, url])
                .await
                .map(|_| ()),
        }
    }

    /// Fetch from the remote.
    pub async fn fetch(&self) -> Result<()> {
        let command = self.remote_command(self.root()).args(["fetch", REMOTE_NAME]);
        self.run_remote(command).await.map(|_| ())
    }

    /// Check out the configured branch.
    ///
    /// Tries, in order: the existing local branch, a new branch tracking
    /// `origin/<branch>`, a new branch from the current commit, and finally
    /// pointing HEAD at the unborn branch.
    pub async fn checkout_branch(&self) -> Result<CheckoutOutcome> {
        let branch = self.branch();
        let local_ref = format!("refs/heads/{branch}");

        if self.ref_exists(&local_ref).await {
            self.git(["checkout", branch, "--"]).await?;
            return Ok(CheckoutOutcome::Existing);
        }

        if self
            .ref_exists(&format!("refs/remotes/{REMOTE_NAME}/{branch}"))
            .await
        {
            let upstream = format!("{REMOTE_NAME}/{branch}");
            match self
                .git(["checkout", "-b", branch, "--track", upstream.as_str()])
                .await
            {
                Ok(_) => return Ok(CheckoutOutcome::Tracking),
                Err(err) => warn!(error = %err, branch, "could not track remote branch"),
            }
        }

        if self.has_commit().await {
            self.git(["checkout", "-b", branch]).await?;
            Ok(CheckoutOutcome::Created)
        } else {
            self.git(["symbolic-ref", "HEAD", local_ref.as_str()])
                .await?;
            Ok(CheckoutOutcome::Unborn)
        }
    }

    /// Rebase the local branch onto the remote branch, stashing local edits
    /// around the rebase. An interrupted rebase is aborted before the error
    /// is returned.
    pub async fn pull_rebase(&self) -> Result<()> {
        let command = self
            .with_identity(self.remote_command(self.root()))
            .args(["pull", "--rebase", "--autostash", REMOTE_NAME, self.branch()]);

        match self.run_remote(command).await {
            Ok(_) => Ok(()),
            Err(err) => {
                if self.rebase_in_progress().await {
                    if let Err(abort) = self.git(["rebase", "--abort"]).await {
                        warn!(error = %abort, "failed to abort rebase");
                    }
                }
                Err(err)
            }
        }
    }

    async fn rebase_in_progress(&self) -> bool {
        let git_dir = self.root().join(".git");
        for marker in ["rebase-merge", "rebase-apply"] {
            if tokio::fs::try_exists(git_dir.join(marker))
                .await
                .unwrap_or(false)
            {
                return true;
            }
        }
        false
    }
}

fn filesystem(path: &Path, source: std::io::Error) -> GitError {
    GitError::Filesystem {
        path: path.to_path_buf(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
