//! Fixtures shared by this crate's unit tests.

use async_trait::async_trait;
use confsync_core::Credential;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use crate::commands::{GitCommand, GitError, GitRunner, Result, SystemGit};
use crate::repo::{CloneRepo, RemoteSpec};

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

/// An empty bare repository whose HEAD names `main`.
pub fn init_bare(dir: &Path) -> PathBuf {
    let bare = dir.join("remote.git");
    std::fs::create_dir_all(&bare).unwrap();
    git(&bare, &["init", "--bare"]);
    git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    bare
}

/// Push one commit holding `files` to `main` of `bare`.
pub fn seed_remote(dir: &Path, bare: &Path, files: &[(&str, &str)]) {
    let seed = dir.join("seed");
    std::fs::create_dir_all(&seed).unwrap();
    git(&seed, &["init"]);
    git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    for (name, content) in files {
        let path = seed.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
    git(&seed, &["add", "-A"]);
    git(&seed, &["commit", "-m", "seed"]);
    git(&seed, &["push", bare.to_str().unwrap(), "main"]);
}

pub fn remote_spec(url: &Path) -> RemoteSpec {
    RemoteSpec {
        url: url.to_string_lossy().into_owned(),
        branch: "main".to_string(),
        credential: Credential::new("deploy-bot", "token"),
    }
}

/// A repo at `<base>/repo` backed by the real git binary.
pub fn clone_repo(base: &Path, bare: &Path) -> CloneRepo {
    CloneRepo::new(
        Arc::new(HermeticGit),
        base.join("repo"),
        base,
        remote_spec(bare),
        "confsync@localhost",
    )
}

/// A repo whose git invocations are recorded rather than executed.
pub fn recording_repo(base: &Path, failing: &[&str]) -> (CloneRepo, Arc<RecordingGit>) {
    let runner = Arc::new(RecordingGit::failing(failing));
    let repo = CloneRepo::new(
        runner.clone(),
        base.join("repo"),
        base,
        remote_spec(Path::new("https://example.invalid/config.git")),
        "confsync@localhost",
    );
    (repo, runner)
}

/// The system git with [`HERMETIC_ENV`] applied to every command.
#[derive(Debug, Default)]
pub struct HermeticGit;

#[async_trait]
impl GitRunner for HermeticGit {
    async fn run(&self, command: &GitCommand) -> Result<String> {
        let command = HERMETIC_ENV
            .into_iter()
            .fold(command.clone(), |command, (key, value)| command.env(key, value));
        SystemGit.run(&command).await
    }
}

/// Records every command; subcommands listed in `failing` exit non-zero.
#[derive(Debug, Default)]
pub struct RecordingGit {
    calls: Mutex<Vec<GitCommand>>,
    failing: Vec<String>,
}

impl RecordingGit {
    pub fn failing(subcommands: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: subcommands.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn calls(&self) -> Vec<GitCommand> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GitRunner for RecordingGit {
    async fn run(&self, command: &GitCommand) -> Result<String> {
        self.calls.lock().unwrap().push(command.clone());
        let subcommand = command.subcommand().unwrap_or_default();
        if self.failing.contains(&subcommand) {
            return Err(GitError::CommandFailed {
                command: subcommand,
                code: Some(1),
                stderr: "simulated failure".to_string(),
            });
        }
        Ok(String::new())
    }
}
