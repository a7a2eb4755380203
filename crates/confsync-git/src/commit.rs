//! Recording local changes as a single rolling commit.
//!
//! The clone keeps at most one commit ahead of whatever the remote last
//! accepted: the first change creates the initial commit and every later one
//! amends HEAD. The branch is then force-pushed (see `push`).

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Display;
use std::path::Path;
use tracing::debug;

use crate::commands::Result;
use crate::repo::CloneRepo;

/// What [`CloneRepo::commit_changes`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing was staged; no commit was made.
    Unchanged,
    /// The first commit on the branch was created.
    Initial { paths: Vec<String> },
    /// HEAD was amended.
    Amended { paths: Vec<String> },
}

impl CommitOutcome {
    pub fn is_changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }

    /// Paths recorded by the commit, relative to the clone root.
    pub fn paths(&self) -> &[String] {
        match self {
            Self::Unchanged => &[],
            Self::Initial { paths } | Self::Amended { paths } => paths,
        }
    }
}

impl CloneRepo {
    /// Stage additions, modifications and deletions under `paths`.
    pub async fn stage<P: AsRef<Path>>(&self, paths: &[P]) -> Result<()> {
        // `add -A` without a pathspec would stage the whole tree.
        if paths.is_empty() {
            return Ok(());
        }
        let command = self
            .command()
            .args(["add", "-A", "--"])
            .args(paths.iter().map(|path| path.as_ref().as_os_str()));
        self.run(command).await.map(|_| ())
    }

    /// Paths with staged changes.
    pub async fn staged_paths(&self) -> Result<Vec<String>> {
        let output = self.git(["diff", "--cached", "--name-only"]).await?;
        Ok(output
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Soft-reset onto the root commit when the branch has grown more than
    /// one commit (e.g. a rebase replayed an unpushed amend onto the remote
    /// commit). The combined changes stay staged and the next amend folds
    /// them back into a single commit.
    pub async fn collapse_history(&self) -> Result<bool> {
        if !self.has_commit().await {
            return Ok(false);
        }
        let count = self.git(["rev-list", "--count", "HEAD"]).await?;
        if count.trim() == "1" {
            return Ok(false);
        }

        let roots = self.git(["rev-list", "--max-parents=0", "HEAD"]).await?;
        let Some(root) = roots.lines().map(str::trim).find(|line| !line.is_empty()) else {
            return Ok(false);
        };
        self.git(["reset", "--soft", root]).await?;
        debug!(commits = count.trim(), root, "collapsed history");
        Ok(true)
    }

    /// Stage `paths` and fold them into the branch's single commit.
    ///
    /// Returns [`CommitOutcome::Unchanged`] without committing when staging
    /// produced no difference.
    pub async fn commit_changes<P: AsRef<Path>>(
        &self,
        paths: &[P],
        message: &str,
    ) -> Result<CommitOutcome> {
        self.collapse_history().await?;
        self.stage(paths).await?;
        let staged = self.staged_paths().await?;
        if staged.is_empty() {
            debug!("nothing staged");
            return Ok(CommitOutcome::Unchanged);
        }

        let amend = self.has_commit().await;
        let mut command = self.with_identity(self.command()).arg("commit");
        if amend {
            command = command.arg("--amend");
        }
        let command = command.args(["--no-verify", "-m", message]);
        self.run(command).await?;

        debug!(amend, paths = ?staged, "committed");
        Ok(if amend {
            CommitOutcome::Amended { paths: staged }
        } else {
            CommitOutcome::Initial { paths: staged }
        })
    }
}

/// Commit message naming the updated keys, with a timestamped body.
pub fn commit_message<K: Display>(keys: &[K], at: DateTime<Utc>) -> String {
    let names = keys
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "confsync: update {names}\n\nUpdated at {}",
        at.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
