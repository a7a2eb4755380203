//! The configuration store: public operations over the three tiers and the
//! synchronization state machine.
//!
//! Every operation first brings the store up (once per instance): with a
//! remote configured, the clone is prepared and the mode becomes ACTIVE;
//! otherwise, or if preparation fails, the store stays LOCAL for its whole
//! lifetime and never invokes git. All work touching the clone runs on a
//! single async lane so concurrent callers cannot interleave their
//! pull/stage/commit/push sequences.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use confsync_config::{StoreSettings, ensure_base_dir};
use confsync_core::{StoreState, TrackedKey, TrackedKeys};
use confsync_git::commit::commit_message;
use confsync_git::{CloneRepo, GitRunner, PushOutcome, RemoteSpec, RetryPolicy, SystemGit};
use confsync_lockfile::StoreLock;

use crate::error::{Result, StoreError};
use crate::fsutil::{copy_dir, read_file, replace_dir, write_file};
use crate::paths::{PathResolver, TierPaths};
use crate::request::{KeyStatus, StoreStatus, SyncAllRequest};
use crate::source::{SourceKind, select_source};

/// A single change applied by a mutating operation.
#[derive(Debug)]
enum Change {
    /// New content for a file.
    Document { key: TrackedKey, bytes: Vec<u8> },
    /// A file already updated at its working location.
    File(TrackedKey),
    /// A directory already updated at its working location.
    Directory(TrackedKey),
}

impl Change {
    fn key(&self) -> &TrackedKey {
        match self {
            Self::Document { key, .. } | Self::File(key) | Self::Directory(key) => key,
        }
    }
}

/// A file-backed configuration store mirrored to a remote git repository.
///
/// Construct one per base directory and share it (`&ConfigStore` or
/// `Arc<ConfigStore>`); the base directory stays locked until it is dropped.
pub struct ConfigStore {
    settings: StoreSettings,
    paths: PathResolver,
    runner: Arc<dyn GitRunner>,
    retry: RetryPolicy,
    state: Mutex<StoreState>,
    tracked: Mutex<TrackedKeys>,
    remote: OnceCell<Option<CloneRepo>>,
    lane: tokio::sync::Mutex<()>,
    _lock: StoreLock,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("paths", &self.paths)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl ConfigStore {
    // -- Construction ---------------------------------------------------------

    /// Open a store using the system `git` binary.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] for invalid settings or an unusable
    /// working directory, and [`StoreError::Locked`] if another process
    /// holds the base directory.
    pub fn open(settings: StoreSettings) -> Result<Self> {
        Self::with_runner(settings, Arc::new(SystemGit))
    }

    /// Open a store that runs git through `runner`.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::open`].
    pub fn with_runner(settings: StoreSettings, runner: Arc<dyn GitRunner>) -> Result<Self> {
        settings.validate()?;
        let base_dir = ensure_base_dir(&settings.base_dir())?;
        let lock = StoreLock::acquire(&base_dir)?;
        let working_dir = settings.working_dir()?;
        let paths = PathResolver::new(working_dir, &base_dir, &settings.clone_dir_name);
        for key in &settings.tracked_keys {
            paths.check(key)?;
        }
        debug!(
            base_dir = %paths.base_dir().display(),
            working_dir = %paths.working_dir().display(),
            "store opened"
        );

        Ok(Self {
            retry: RetryPolicy::new(settings.push_attempts, settings.push_retry_delay()),
            state: Mutex::new(StoreState::new(settings.branch.clone())),
            tracked: Mutex::new(settings.tracked_keys.iter().cloned().collect()),
            remote: OnceCell::new(),
            lane: tokio::sync::Mutex::new(()),
            _lock: lock,
            settings,
            paths,
            runner,
        })
    }

    // -- Snapshots ------------------------------------------------------------

    /// The current state. Never initializes.
    pub fn state(&self) -> StoreState {
        self.lock_state().clone()
    }

    /// Tracked keys in the order they were first seen.
    pub fn tracked_keys(&self) -> Vec<TrackedKey> {
        self.tracked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .to_vec()
    }

    pub fn paths(&self) -> &PathResolver {
        &self.paths
    }

    /// State, tracked keys and their locations. Never initializes and never
    /// touches the remote.
    pub fn status(&self) -> StoreStatus {
        let keys = self
            .tracked_keys()
            .into_iter()
            .map(|key| KeyStatus {
                paths: self.paths.resolve(&key),
                key,
            })
            .collect();
        StoreStatus {
            state: self.state(),
            initialized: self.remote.initialized(),
            base_dir: self.paths.base_dir().to_path_buf(),
            clone_dir: self.paths.clone_dir().to_path_buf(),
            keys,
        }
    }

    // -- Operations -----------------------------------------------------------

    /// Track `extra`, bring the store up and materialize every tracked key.
    ///
    /// # Errors
    ///
    /// Fails only on local I/O errors; remote problems are reported in the
    /// returned state.
    pub async fn initialize(&self, extra: &[TrackedKey]) -> Result<StoreState> {
        self.track(extra.iter().cloned())?;
        let remote = self.ensure_initialized().await;

        let _lane = self.lane.lock().await;
        let keys = self.tracked_keys();
        self.materialize_locked(&keys, &[], remote.is_some()).await?;
        Ok(self.state())
    }

    /// Copy the best available source of each key into every tier.
    ///
    /// An empty `keys` materializes every tracked key.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::initialize`].
    pub async fn materialize(&self, keys: &[TrackedKey]) -> Result<StoreState> {
        self.track(keys.iter().cloned())?;
        let remote = self.ensure_initialized().await;

        let _lane = self.lane.lock().await;
        let keys = if keys.is_empty() {
            self.tracked_keys()
        } else {
            keys.to_vec()
        };
        self.materialize_locked(&keys, &[], remote.is_some()).await?;
        Ok(self.state())
    }

    /// Read `key` as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no tier holds the key,
    /// [`StoreError::NotAFile`] for a directory and
    /// [`StoreError::Serialization`] if the content is not valid JSON.
    pub async fn read(&self, key: &TrackedKey) -> Result<serde_json::Value> {
        self.read_as(key).await
    }

    /// Read `key` and deserialize it into `T`.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::read`].
    pub async fn read_as<T: DeserializeOwned>(&self, key: &TrackedKey) -> Result<T> {
        let bytes = self.read_raw(key).await?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Serialization {
            key: key.to_string(),
            source,
        })
    }

    /// Read the bytes of `key` from its authoritative tier.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::read`].
    pub async fn read_raw(&self, key: &TrackedKey) -> Result<Vec<u8>> {
        self.track([key.clone()])?;
        let remote = self.ensure_initialized().await;

        let _lane = self.lane.lock().await;
        self.materialize_locked(std::slice::from_ref(key), &[], remote.is_some())
            .await?;

        let paths = self.paths.resolve(key);
        let source = select_source(&paths, self.state().mode)
            .await
            .map_err(|err| StoreError::io(&paths.working, err))?
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })?;
        if source.kind == SourceKind::Directory {
            return Err(StoreError::NotAFile {
                key: key.to_string(),
            });
        }
        debug!(key = %key, tier = %source.tier, "read");
        read_file(&source.path).await
    }

    /// Write `value` as pretty-printed JSON to every tier and synchronize.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if `value` cannot be encoded,
    /// or a local I/O error. Remote failures only change the returned state.
    pub async fn write<T: Serialize + ?Sized>(
        &self,
        key: &TrackedKey,
        value: &T,
    ) -> Result<StoreState> {
        let bytes = to_pretty_json(key, value)?;
        self.apply(vec![Change::Document {
            key: key.clone(),
            bytes,
        }])
        .await
    }

    /// Copy the working directory `key` over its mirror and clone copies
    /// (deletions included) and synchronize.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the working directory is missing,
    /// [`StoreError::NotADirectory`] if it is a file, or a local I/O error.
    pub async fn sync_directory(&self, key: &TrackedKey) -> Result<StoreState> {
        self.apply(vec![Change::Directory(key.clone())]).await
    }

    /// Apply a batch of documents, files and directories with a single
    /// commit and push.
    ///
    /// # Errors
    ///
    /// See [`ConfigStore::write`] and [`ConfigStore::sync_directory`].
    pub async fn sync_all(&self, request: SyncAllRequest) -> Result<StoreState> {
        let mut changes = Vec::new();
        for (key, value) in &request.documents {
            changes.push(Change::Document {
                bytes: to_pretty_json(key, value)?,
                key: key.clone(),
            });
        }
        changes.extend(request.files.into_iter().map(Change::File));
        changes.extend(request.directories.into_iter().map(Change::Directory));
        self.apply(changes).await
    }

    // -- Bring-up -------------------------------------------------------------

    async fn ensure_initialized(&self) -> Option<&CloneRepo> {
        self.remote
            .get_or_init(|| self.bring_up())
            .await
            .as_ref()
    }

    async fn bring_up(&self) -> Option<CloneRepo> {
        let Some(remote) = self.settings.remote() else {
            let missing = self.settings.missing_remote_env();
            self.update(|state| state.enter_local(format!("Missing env: {}", missing.join(", "))));
            return None;
        };

        let repo = CloneRepo::new(
            Arc::clone(&self.runner),
            self.paths.clone_dir(),
            self.paths.base_dir(),
            RemoteSpec {
                url: remote.url,
                branch: remote.branch,
                credential: remote.credential,
            },
            self.settings.author_email.clone(),
        );

        let _lane = self.lane.lock().await;
        match repo.bring_up().await {
            Ok(report) => {
                for (step, message) in report.tolerated() {
                    debug!(step, message, "bring-up continued past failure");
                }
                self.update(StoreState::mark_active);
                Some(repo)
            }
            Err(err) => {
                warn!(error = %err, "repository preparation failed; using local tiers only");
                self.update(|state| state.enter_local(err.to_string()));
                None
            }
        }
    }

    // -- Writes ---------------------------------------------------------------

    async fn apply(&self, changes: Vec<Change>) -> Result<StoreState> {
        let keys: Vec<TrackedKey> = changes.iter().map(|change| change.key().clone()).collect();
        self.track(keys.iter().cloned())?;
        let remote = self.ensure_initialized().await;

        let _lane = self.lane.lock().await;
        if let Some(repo) = remote {
            if let Err(err) = self.refresh(repo).await {
                self.update(|state| state.mark_degraded(err.to_string()));
            }
        }

        let tracked = self.tracked_keys();
        self.materialize_locked(&tracked, &keys, remote.is_some())
            .await?;
        for change in &changes {
            self.write_tiers(change, remote.is_some()).await?;
        }

        match remote {
            Some(repo) => Ok(self.synchronize(repo, &keys).await),
            None => Ok(self.update(StoreState::settle_local_write)),
        }
    }

    /// Bring the clone up to date before a write.
    ///
    /// While a push is pending, HEAD is an amended commit the remote never
    /// accepted; rebasing it onto the remote would add a second commit, so
    /// only fetch. The next force-push replaces the remote branch anyway.
    async fn refresh(&self, repo: &CloneRepo) -> confsync_git::Result<()> {
        if self.state().pending {
            debug!("push pending; fetching without rebase");
            repo.fetch().await
        } else {
            repo.pull_rebase().await
        }
    }

    async fn write_tiers(&self, change: &Change, include_clone: bool) -> Result<()> {
        let paths = self.paths.resolve(change.key());
        let mut targets = vec![&paths.mirror];
        if include_clone {
            targets.push(&paths.clone);
        }

        match change {
            Change::Document { bytes, .. } => {
                write_file(&paths.working, bytes).await?;
                for target in targets {
                    write_file(target, bytes).await?;
                }
            }
            Change::File(key) => {
                expect_kind(key, &paths.working, SourceKind::File).await?;
                let bytes = read_file(&paths.working).await?;
                for target in targets {
                    write_file(target, &bytes).await?;
                }
            }
            Change::Directory(key) => {
                expect_kind(key, &paths.working, SourceKind::Directory).await?;
                for target in targets {
                    replace_dir(&paths.working, target).await?;
                }
            }
        }
        Ok(())
    }

    /// Commit the written keys and push if anything is new or still pending.
    async fn synchronize(&self, repo: &CloneRepo, keys: &[TrackedKey]) -> StoreState {
        let mut changed = false;
        if !keys.is_empty() {
            let paths: Vec<PathBuf> = keys.iter().map(TrackedKey::relative_path).collect();
            let message = commit_message(keys, Utc::now());
            match repo.commit_changes(&paths, &message).await {
                Ok(outcome) => {
                    if outcome.is_changed() {
                        info!(paths = ?outcome.paths(), "committed");
                    }
                    changed = outcome.is_changed();
                }
                Err(err) => {
                    warn!(error = %err, "commit failed");
                    return self.update(|state| state.mark_degraded(err.to_string()));
                }
            }
        }

        let required = changed || self.state().pending;
        let outcome = repo
            .push_with_retry(required, &self.retry, |_, err| {
                self.update(|state| state.record_error(err.to_string()));
            })
            .await;

        match outcome {
            PushOutcome::Failed { last_error, .. } => {
                self.update(|state| state.mark_degraded(last_error))
            }
            PushOutcome::Skipped | PushOutcome::Pushed { .. } => {
                self.update(StoreState::mark_active)
            }
        }
    }

    // -- Materialization ------------------------------------------------------

    /// Copy each key's source into the other tiers. Keys whose working path
    /// matches one in `skip` are left alone. Must run on the lane.
    async fn materialize_locked(
        &self,
        keys: &[TrackedKey],
        skip: &[TrackedKey],
        include_clone: bool,
    ) -> Result<()> {
        let mode = self.state().mode;
        let skipped: Vec<PathBuf> = skip
            .iter()
            .map(|key| self.paths.resolve(key).working)
            .collect();

        for key in keys {
            let paths = self.paths.resolve(key);
            if skipped.contains(&paths.working) {
                continue;
            }
            let Some(source) = select_source(&paths, mode)
                .await
                .map_err(|err| StoreError::io(&paths.working, err))?
            else {
                continue;
            };

            let targets = materialization_targets(&paths, include_clone, &source.path);
            match source.kind {
                SourceKind::Directory => {
                    for target in &targets {
                        copy_dir(&source.path, target).await?;
                    }
                }
                SourceKind::File => {
                    let bytes = read_file(&source.path).await?;
                    for target in &targets {
                        write_file(target, &bytes).await?;
                    }
                }
            }
            debug!(key = %key, tier = %source.tier, "materialized");
        }
        Ok(())
    }

    // -- State ----------------------------------------------------------------

    /// Validate `keys` against the store's own files and start tracking
    /// them. Nothing is tracked if any key is rejected.
    fn track<I: IntoIterator<Item = TrackedKey>>(&self, keys: I) -> Result<()> {
        let keys: Vec<TrackedKey> = keys.into_iter().collect();
        for key in &keys {
            self.paths.check(key)?;
        }
        let added = self
            .tracked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(keys);
        if added > 0 {
            debug!(added, "tracking new keys");
        }
        Ok(())
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` to the state and return the new snapshot.
    fn update(&self, change: impl FnOnce(&mut StoreState)) -> StoreState {
        let mut state = self.lock_state();
        let before = state.mode;
        change(&mut state);
        if state.mode != before {
            info!(from = %before, to = %state.mode, error = ?state.error, "mode changed");
        }
        state.clone()
    }
}

/// Tiers a materialization writes to, never including the source itself.
fn materialization_targets(paths: &TierPaths, include_clone: bool, source: &Path) -> Vec<PathBuf> {
    let mut targets = vec![paths.working.clone(), paths.mirror.clone()];
    if include_clone {
        targets.push(paths.clone.clone());
    }
    targets.retain(|target| target != source);
    targets
}

async fn expect_kind(key: &TrackedKey, path: &Path, kind: SourceKind) -> Result<()> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        }
        Err(err) => return Err(StoreError::io(path, err)),
    };
    match (kind, metadata.is_dir()) {
        (SourceKind::File, true) => Err(StoreError::NotAFile {
            key: key.to_string(),
        }),
        (SourceKind::Directory, false) => Err(StoreError::NotADirectory {
            key: key.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Two-space indented JSON with a trailing newline.
fn to_pretty_json<T: Serialize + ?Sized>(key: &TrackedKey, value: &T) -> Result<Vec<u8>> {
    let mut bytes =
        serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serialization {
            key: key.to_string(),
            source,
        })?;
    bytes.push(b'\n');
    Ok(bytes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_pretty_json_has_trailing_newline() {
        let key = TrackedKey::new("config.json").unwrap();
        let bytes = to_pretty_json(&key, &json!({"a": 1})).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "{\n  \"a\": 1\n}\n");
    }

    #[test]
    fn test_materialization_skips_source_tier() {
        let resolver = PathResolver::new("/work", "/base", "repo");
        let paths = resolver.resolve(&TrackedKey::new("config.json").unwrap());

        let from_clone = materialization_targets(&paths, true, &paths.clone);
        assert_eq!(from_clone, vec![paths.working.clone(), paths.mirror.clone()]);

        let from_example = materialization_targets(&paths, false, &paths.example());
        assert_eq!(from_example, vec![paths.working.clone(), paths.mirror.clone()]);
    }
}
