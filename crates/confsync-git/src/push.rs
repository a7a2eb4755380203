//! Force-pushing the branch with a bounded, fixed-delay retry.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::commands::{GitError, Result};
use crate::repo::{CloneRepo, REMOTE_NAME};

/// How often, and how far apart, pushes are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    fn max_attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

/// Result of [`CloneRepo::push_with_retry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Nothing to push: no new commit and nothing pending.
    Skipped,
    /// The remote accepted the branch on attempt `attempts`.
    Pushed { attempts: u32 },
    /// Every attempt failed.
    Failed { attempts: u32, last_error: String },
}

impl CloneRepo {
    /// Force-push the branch once.
    pub async fn push(&self) -> Result<()> {
        let command = self.remote_command(self.root()).args([
            "push",
            "--force",
            "--set-upstream",
            REMOTE_NAME,
            self.branch(),
        ]);
        self.run_remote(command).await.map(|_| ())
    }

    /// Force-push the branch if `required`, retrying per `policy`.
    ///
    /// `on_failure` is called after every failed attempt with the attempt
    /// number and the error, before any pause. No pause follows the last
    /// attempt.
    pub async fn push_with_retry<F>(
        &self,
        required: bool,
        policy: &RetryPolicy,
        mut on_failure: F,
    ) -> PushOutcome
    where
        F: FnMut(u32, &GitError) + Send,
    {
        if !required {
            debug!("push not required");
            return PushOutcome::Skipped;
        }

        let max_attempts = policy.max_attempts();
        let mut last_error = String::new();
        for attempt in 1..=max_attempts {
            match self.push().await {
                Ok(()) => {
                    info!(attempt, branch = self.branch(), "pushed");
                    return PushOutcome::Pushed { attempts: attempt };
                }
                Err(err) => {
                    warn!(attempt, max_attempts, error = %err, "push failed");
                    on_failure(attempt, &err);
                    last_error = err.to_string();
                    if attempt < max_attempts {
                        tokio::time::sleep(policy.delay).await;
                    }
                }
            }
        }

        PushOutcome::Failed {
            attempts: max_attempts,
            last_error,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
