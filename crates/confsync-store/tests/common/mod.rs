//! Shared fixtures for the store integration tests.
//!
//! Remotes are bare repositories in a temporary directory, reached through
//! their filesystem path, so the tests need a `git` binary but no network.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Instant;

use confsync_config::StoreSettings;
use confsync_git::{GitCommand, GitError, GitRunner, SystemGit};
use confsync_store::{ConfigStore, StoreState, TrackedKey};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Git helpers
// ---------------------------------------------------------------------------

/// Keeps the user's and the system's git configuration (hooks, default
/// branch, credential helpers) out of the tests.
pub const HERMETIC_ENV: [(&str, &str); 2] = [
    ("GIT_CONFIG_GLOBAL", "/dev/null"),
    ("GIT_CONFIG_NOSYSTEM", "1"),
];

/// Run git synchronously, panicking on failure. Returns trimmed stdout.
pub fn git(cwd: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .envs(HERMETIC_ENV)
        .args(["-c", "user.name=seed", "-c", "user.email=seed@example.com"])
        .args(["-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(cwd)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Number of commits on `main` in `bare`, or 0 if the branch does not exist.
pub fn commit_count(bare: &Path) -> usize {
    let output = Command::new("git")
        .envs(HERMETIC_ENV)
        .args(["rev-list", "--count", "main"])
        .current_dir(bare)
        .output()
        .unwrap();
    if !output.status.success() {
        return 0;
    }
    String::from_utf8_lossy(&output.stdout).trim().parse().unwrap()
}

/// Content of `path` on the remote's `main`.
pub fn remote_file(bare: &Path, path: &str) -> String {
    git(bare, &["show", &format!("main:{path}")])
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// A temporary layout: `remote.git` (bare), `base/` and `work/`.
pub struct Fixture {
    pub dir: TempDir,
    pub bare: PathBuf,
    pub base: PathBuf,
    pub work: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bare = dir.path().join("remote.git");
        std::fs::create_dir_all(&bare).unwrap();
        git(&bare, &["init", "--bare"]);
        git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        let base = dir.path().join("base");
        let work = dir.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        Self {
            dir,
            bare,
            base,
            work,
        }
    }

    /// Settings bound to the bare remote, with no pause between pushes.
    pub fn settings(&self) -> StoreSettings {
        StoreSettings {
            remote_url: Some(self.bare.to_string_lossy().into_owned()),
            username: Some("deploy-bot".to_string()),
            token: Some("secret-token".to_string()),
            base_dir: Some(self.base.clone()),
            working_dir: Some(self.work.clone()),
            push_retry_delay_ms: 0,
            ..StoreSettings::default()
        }
    }

    /// Settings with no remote at all.
    pub fn local_settings(&self) -> StoreSettings {
        StoreSettings {
            remote_url: None,
            username: None,
            token: None,
            ..self.settings()
        }
    }

    pub fn open(&self) -> ConfigStore {
        self.open_with(Arc::new(HermeticGit))
    }

    pub fn open_with(&self, runner: Arc<dyn GitRunner>) -> ConfigStore {
        ConfigStore::with_runner(self.settings(), runner).unwrap()
    }

    pub fn mirror(&self, key: &str) -> PathBuf {
        self.base.join(key)
    }

    pub fn clone_path(&self, key: &str) -> PathBuf {
        self.base.join("repo").join(key)
    }

    pub fn working(&self, key: &str) -> PathBuf {
        self.work.join(key)
    }

    /// Push one commit holding `files` to the remote's `main`.
    pub fn seed_remote(&self, files: &[(&str, &str)]) {
        let seed = self.dir.path().join("seed");
        std::fs::create_dir_all(&seed).unwrap();
        git(&seed, &["init"]);
        git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        for (name, content) in files {
            put(&seed.join(name), content);
        }
        git(&seed, &["add", "-A"]);
        git(&seed, &["commit", "-m", "seed"]);
        git(&seed, &["push", self.bare.to_str().unwrap(), "main"]);
    }
}

pub fn key(raw: &str) -> TrackedKey {
    TrackedKey::new(raw).unwrap()
}

pub fn put(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

// ---------------------------------------------------------------------------
// Runners
// ---------------------------------------------------------------------------

/// Records every invocation and never runs anything.
#[derive(Debug, Default)]
pub struct RecordingGit {
    calls: Mutex<Vec<GitCommand>>,
}

impl RecordingGit {
    pub fn calls(&self) -> Vec<GitCommand> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GitRunner for RecordingGit {
    async fn run(&self, command: &GitCommand) -> confsync_git::Result<String> {
        self.calls.lock().unwrap().push(command.clone());
        Ok(String::new())
    }
}

/// The system git with [`HERMETIC_ENV`] applied to every command.
#[derive(Debug, Default)]
pub struct HermeticGit;

#[async_trait]
impl GitRunner for HermeticGit {
    async fn run(&self, command: &GitCommand) -> confsync_git::Result<String> {
        let command = HERMETIC_ENV
            .into_iter()
            .fold(command.clone(), |command, (key, value)| command.env(key, value));
        SystemGit.run(&command).await
    }
}

/// Runs real git, but fails `pull` and `push` on demand. Every push attempt
/// records the state of the observed store at that moment.
#[derive(Debug, Default)]
pub struct FlakyGit {
    pull_fails: AtomicBool,
    push_fails: AtomicBool,
    pushes: Mutex<Vec<Instant>>,
    store: OnceLock<Weak<ConfigStore>>,
    states_at_push: Mutex<Vec<StoreState>>,
}

impl FlakyGit {
    /// Every push fails until told otherwise.
    pub fn failing() -> Self {
        let runner = Self::default();
        runner.set_push_fails(true);
        runner
    }

    pub fn set_push_fails(&self, fails: bool) {
        self.push_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_pull_fails(&self, fails: bool) {
        self.pull_fails.store(fails, Ordering::SeqCst);
    }

    /// Record `store`'s state at every push attempt.
    pub fn observe(&self, store: &Arc<ConfigStore>) {
        let _ = self.store.set(Arc::downgrade(store));
    }

    /// When each push was attempted.
    pub fn pushes(&self) -> Vec<Instant> {
        self.pushes.lock().unwrap().clone()
    }

    /// The observed store's state as each push started.
    pub fn states_at_push(&self) -> Vec<StoreState> {
        self.states_at_push.lock().unwrap().clone()
    }
}

#[async_trait]
impl GitRunner for FlakyGit {
    async fn run(&self, command: &GitCommand) -> confsync_git::Result<String> {
        match command.subcommand().as_deref() {
            Some("pull") if self.pull_fails.load(Ordering::SeqCst) => {
                return Err(GitError::CommandFailed {
                    command: "pull".to_string(),
                    code: Some(1),
                    stderr: "fatal: could not read from remote repository".to_string(),
                });
            }
            Some("push") => {
                self.pushes.lock().unwrap().push(Instant::now());
                if let Some(store) = self.store.get().and_then(Weak::upgrade) {
                    self.states_at_push.lock().unwrap().push(store.state());
                }
                if self.push_fails.load(Ordering::SeqCst) {
                    return Err(GitError::CommandFailed {
                        command: "push".to_string(),
                        code: Some(128),
                        stderr: "fatal: unable to access remote".to_string(),
                    });
                }
            }
            _ => {}
        }
        HermeticGit.run(command).await
    }
}
