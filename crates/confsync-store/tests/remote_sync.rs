//! Synchronization against a real (local, bare) git remote.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{FlakyGit, Fixture, HermeticGit, commit_count, git, key, put, read, remote_file};
use confsync_core::KeyError;
use confsync_store::{ConfigStore, StoreError, StoreMode, SyncAllRequest};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn initialize_against_empty_remote_is_active() {
    let fixture = Fixture::new();
    let store = fixture.open();

    let state = store.initialize(&[]).await.unwrap();
    assert_eq!(state.mode, StoreMode::Active);
    assert!(!state.pending);
    assert_eq!(state.error, None);
    assert_eq!(state.branch, "main");
    assert!(fixture.base.join("repo/.git").exists());
}

#[tokio::test]
async fn unreachable_remote_falls_back_to_local() {
    let fixture = Fixture::new();
    let settings = confsync_config::StoreSettings {
        remote_url: Some(fixture.dir.path().join("missing.git").display().to_string()),
        ..fixture.settings()
    };
    let store = ConfigStore::with_runner(settings, Arc::new(HermeticGit)).unwrap();

    let state = store.initialize(&[]).await.unwrap();
    assert_eq!(state.mode, StoreMode::Local);
    assert!(state.error.is_some());

    // Writes still succeed locally and stay local for the process.
    let state = store.write(&key("config.json"), &json!({"a": 1})).await.unwrap();
    assert_eq!(state.mode, StoreMode::Local);
    assert!(!state.pending);
    assert_eq!(read(&fixture.mirror("config.json")), "{\n  \"a\": 1\n}\n");
}

#[tokio::test]
async fn write_then_read_round_trips_through_remote() {
    let fixture = Fixture::new();
    let store = fixture.open();

    let state = store.write(&key("config.json"), &json!({"a": 1})).await.unwrap();
    assert_eq!(state.mode, StoreMode::Active);
    assert!(!state.pending);
    assert_eq!(state.error, None);

    assert_eq!(store.read(&key("config.json")).await.unwrap(), json!({"a": 1}));
    assert_eq!(remote_file(&fixture.bare, "config.json"), "{\n  \"a\": 1\n}");
    assert_eq!(commit_count(&fixture.bare), 1);

    let subject = git(&fixture.bare, &["log", "-1", "--format=%s", "main"]);
    assert_eq!(subject, "confsync: update config.json");
    let author = git(&fixture.bare, &["log", "-1", "--format=%an <%ae>", "main"]);
    assert_eq!(author, "deploy-bot <confsync@localhost>");
}

#[tokio::test]
async fn remote_history_stays_a_single_snapshot() {
    let fixture = Fixture::new();
    let store = fixture.open();

    for round in 1..=3 {
        store
            .write(&key("config.json"), &json!({"round": round}))
            .await
            .unwrap();
    }
    store.write(&key("pools.json"), &json!([])).await.unwrap();

    assert_eq!(commit_count(&fixture.bare), 1);
    assert_eq!(
        remote_file(&fixture.bare, "config.json"),
        "{\n  \"round\": 3\n}"
    );
    assert_eq!(remote_file(&fixture.bare, "pools.json"), "[]");
}

#[tokio::test]
async fn failed_push_degrades_but_keeps_data() {
    let fixture = Fixture::new();
    let runner = Arc::new(FlakyGit::failing());
    let store = fixture.open_with(runner.clone());

    let state = store.write(&key("config.json"), &json!({"a": 1})).await.unwrap();

    assert_eq!(state.mode, StoreMode::Degraded);
    assert!(state.pending);
    assert!(
        state.error.as_deref().unwrap_or_default().contains("unable to access remote"),
        "{state:?}"
    );
    assert_eq!(read(&fixture.mirror("config.json")), "{\n  \"a\": 1\n}\n");
    assert_eq!(read(&fixture.working("config.json")), "{\n  \"a\": 1\n}\n");
    assert_eq!(runner.pushes().len(), 3);
    assert_eq!(commit_count(&fixture.bare), 0);
}

#[tokio::test]
async fn push_attempts_are_bounded_and_spaced() {
    let fixture = Fixture::new();
    let settings = confsync_config::StoreSettings {
        push_retry_delay_ms: 50,
        ..fixture.settings()
    };
    let runner = Arc::new(FlakyGit::failing());
    let store = ConfigStore::with_runner(settings, runner.clone()).unwrap();

    store.write(&key("config.json"), &json!({"a": 1})).await.unwrap();

    let pushes = runner.pushes();
    assert_eq!(pushes.len(), 3);
    for pair in pushes.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(50));
    }
}

#[tokio::test]
async fn pending_change_is_pushed_by_next_noop_write() {
    let fixture = Fixture::new();
    let runner = Arc::new(FlakyGit::failing());
    let store = fixture.open_with(runner.clone());
    store.write(&key("config.json"), &json!({"a": 1})).await.unwrap();
    assert_eq!(store.state().mode, StoreMode::Degraded);

    runner.set_push_fails(false);
    let state = store.write(&key("config.json"), &json!({"a": 1})).await.unwrap();

    assert_eq!(state.mode, StoreMode::Active);
    assert!(!state.pending);
    assert_eq!(state.error, None);
    assert_eq!(remote_file(&fixture.bare, "config.json"), "{\n  \"a\": 1\n}");
}

#[tokio::test]
async fn recovery_after_failed_push_keeps_single_commit() {
    let fixture = Fixture::new();
    let runner = Arc::new(FlakyGit::default());
    let store = fixture.open_with(runner.clone());

    store.write(&key("config.json"), &json!({"round": 1})).await.unwrap();
    assert_eq!(commit_count(&fixture.bare), 1);

    runner.set_push_fails(true);
    let state = store.write(&key("config.json"), &json!({"round": 2})).await.unwrap();
    assert_eq!(state.mode, StoreMode::Degraded);

    runner.set_push_fails(false);
    let state = store.write(&key("config.json"), &json!({"round": 3})).await.unwrap();
    assert_eq!(state.mode, StoreMode::Active);
    assert!(!state.pending);
    assert_eq!(commit_count(&fixture.bare), 1);
    assert_eq!(remote_file(&fixture.bare, "config.json"), "{\n  \"round\": 3\n}");

    store.write(&key("pools.json"), &json!([])).await.unwrap();
    assert_eq!(commit_count(&fixture.bare), 1);
    let clone = fixture.base.join("repo");
    assert_eq!(git(&clone, &["rev-list", "--count", "HEAD"]), "1");
}

#[tokio::test]
async fn failed_pull_before_write_degrades_until_push_succeeds() {
    let fixture = Fixture::new();
    fixture.seed_remote(&[("config.json", "{}")]);
    let runner = Arc::new(FlakyGit::default());
    let store = Arc::new(fixture.open_with(runner.clone()));
    runner.observe(&store);
    assert_eq!(store.initialize(&[]).await.unwrap().mode, StoreMode::Active);

    runner.set_pull_fails(true);
    let state = store.write(&key("config.json"), &json!({"a": 1})).await.unwrap();

    // The push ran after the pull had already degraded the store.
    let seen = runner.states_at_push();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].mode, StoreMode::Degraded);
    assert!(seen[0].pending);
    assert!(
        seen[0].error.as_deref().unwrap_or_default().contains("could not read from remote"),
        "{seen:?}"
    );

    assert_eq!(state.mode, StoreMode::Active);
    assert!(!state.pending);
    assert_eq!(state.error, None);
    assert_eq!(read(&fixture.working("config.json")), "{\n  \"a\": 1\n}\n");
    assert_eq!(read(&fixture.mirror("config.json")), "{\n  \"a\": 1\n}\n");
    assert_eq!(remote_file(&fixture.bare, "config.json"), "{\n  \"a\": 1\n}");
}

#[tokio::test]
async fn push_failures_are_visible_while_retrying() {
    let fixture = Fixture::new();
    fixture.seed_remote(&[("config.json", "{}")]);
    let runner = Arc::new(FlakyGit::failing());
    let store = Arc::new(fixture.open_with(runner.clone()));
    runner.observe(&store);

    let state = store.write(&key("config.json"), &json!({"a": 1})).await.unwrap();

    let seen = runner.states_at_push();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0].error, None);
    for retry in &seen[1..] {
        assert_eq!(retry.mode, StoreMode::Active);
        assert!(
            retry.error.as_deref().unwrap_or_default().contains("unable to access remote"),
            "{retry:?}"
        );
    }
    assert_eq!(state.mode, StoreMode::Degraded);
    assert!(state.pending);
}

#[tokio::test]
async fn identical_write_neither_commits_nor_pushes() {
    let fixture = Fixture::new();
    let runner = Arc::new(FlakyGit::default());
    let store = fixture.open_with(runner.clone());

    store.write(&key("config.json"), &json!({"a": 1})).await.unwrap();
    let head = git(&fixture.bare, &["rev-parse", "main"]);
    assert_eq!(runner.pushes().len(), 1);

    let state = store.write(&key("config.json"), &json!({"a": 1})).await.unwrap();

    assert_eq!(state.mode, StoreMode::Active);
    assert_eq!(runner.pushes().len(), 1);
    assert_eq!(git(&fixture.bare, &["rev-parse", "main"]), head);
    assert_eq!(git(&fixture.base.join("repo"), &["rev-parse", "HEAD"]), head);
}

#[tokio::test]
async fn clone_wins_over_mirror_when_syncing() {
    let fixture = Fixture::new();
    fixture.seed_remote(&[("config.json", "{\"from\":\"remote\"}")]);
    put(&fixture.mirror("config.json"), "{\"from\":\"mirror\"}");
    let store = fixture.open();

    assert_eq!(
        store.read(&key("config.json")).await.unwrap(),
        json!({"from": "remote"})
    );
    // Materialization brought the other tiers in line.
    assert_eq!(read(&fixture.mirror("config.json")), "{\"from\":\"remote\"}");
    assert_eq!(read(&fixture.working("config.json")), "{\"from\":\"remote\"}");
}

#[tokio::test]
async fn initialize_materializes_remote_content() {
    let fixture = Fixture::new();
    fixture.seed_remote(&[
        ("config.json", "{}"),
        ("configs/a.json", "{\"a\":true}"),
    ]);
    let store = fixture.open();

    let state = store.initialize(&[]).await.unwrap();

    assert_eq!(state.mode, StoreMode::Active);
    assert_eq!(read(&fixture.working("configs/a.json")), "{\"a\":true}");
    assert_eq!(read(&fixture.mirror("configs/a.json")), "{\"a\":true}");
    assert_eq!(read(&fixture.working("config.json")), "{}");
}

#[tokio::test]
async fn sync_directory_commits_the_added_file() {
    let fixture = Fixture::new();
    let store = fixture.open();
    store.initialize(&[]).await.unwrap();

    put(&fixture.working("configs/a.json"), "{\"a\":1}");
    let state = store.sync_directory(&key("configs")).await.unwrap();

    assert_eq!(state.mode, StoreMode::Active);
    assert!(!state.pending);
    assert_eq!(commit_count(&fixture.bare), 1);
    let changed = git(
        &fixture.bare,
        &["show", "--name-only", "--format=", "main"],
    );
    assert_eq!(changed, "configs/a.json");
    assert_eq!(remote_file(&fixture.bare, "configs/a.json"), "{\"a\":1}");
}

#[tokio::test]
async fn sync_directory_propagates_deletions_to_remote() {
    let fixture = Fixture::new();
    let store = fixture.open();
    put(&fixture.working("configs/a.json"), "a");
    put(&fixture.working("configs/b.json"), "b");
    store.sync_directory(&key("configs")).await.unwrap();

    std::fs::remove_file(fixture.working("configs/b.json")).unwrap();
    store.sync_directory(&key("configs")).await.unwrap();

    let files = git(&fixture.bare, &["ls-tree", "-r", "--name-only", "main"]);
    assert_eq!(files, "configs/a.json");
}

#[tokio::test]
async fn sync_all_uses_one_commit_and_one_push() {
    let fixture = Fixture::new();
    let runner = Arc::new(FlakyGit::default());
    let store = fixture.open_with(runner.clone());
    put(&fixture.working("working-state.md"), "# state\n");
    put(&fixture.working("configs/a.json"), "{}");

    let request = SyncAllRequest::new()
        .document("config.json", json!({"a": 1}))
        .unwrap()
        .document("pools.json", json!([{"name": "p"}]))
        .unwrap()
        .file("working-state.md")
        .unwrap()
        .directory("configs")
        .unwrap();
    let state = store.sync_all(request).await.unwrap();

    assert_eq!(state.mode, StoreMode::Active);
    assert_eq!(runner.pushes().len(), 1);
    assert_eq!(commit_count(&fixture.bare), 1);
    let files = git(&fixture.bare, &["ls-tree", "-r", "--name-only", "main"]);
    assert_eq!(
        files,
        "config.json\nconfigs/a.json\npools.json\nworking-state.md"
    );
    assert_eq!(read(&fixture.mirror("working-state.md")), "# state\n");
}

#[tokio::test]
async fn keys_inside_the_clone_are_rejected() {
    let fixture = Fixture::new();
    let store = fixture.open();
    store.write(&key("config.json"), &json!({"a": 1})).await.unwrap();
    put(&fixture.working("repo/x.json"), "{}");

    let err = store.sync_directory(&key("repo")).await.unwrap_err();
    assert!(
        matches!(err, StoreError::InvalidKey(KeyError::Reserved { .. })),
        "{err:?}"
    );
    let err = store.write(&key("repo/x.json"), &json!({})).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidKey(_)), "{err:?}");
    let err = store.write(&key(".git/config"), &json!({"x": 1})).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidKey(_)), "{err:?}");

    let clone = fixture.base.join("repo");
    assert!(clone.join(".git").is_dir());
    assert!(read(&clone.join(".git/config")).contains("[core]"));
    assert!(!store.tracked_keys().contains(&key("repo")));

    let state = store.write(&key("config.json"), &json!({"a": 2})).await.unwrap();
    assert_eq!(state.mode, StoreMode::Active);
    assert_eq!(state.error, None);
    assert_eq!(remote_file(&fixture.bare, "config.json"), "{\n  \"a\": 2\n}");
}

#[tokio::test]
async fn askpass_helpers_do_not_outlive_operations() {
    let fixture = Fixture::new();
    let store = fixture.open();
    store.write(&key("config.json"), &json!({"a": 1})).await.unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(&fixture.base)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(".askpass-"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[tokio::test]
async fn concurrent_writes_are_serialized() {
    let fixture = Fixture::new();
    let store = Arc::new(fixture.open());

    let mut handles = Vec::new();
    for (name, value) in [("config.json", 1), ("pools.json", 2), ("extra.json", 3)] {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            store.write(&key(name), &json!({"v": value})).await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.state().mode, StoreMode::Active);
    assert_eq!(commit_count(&fixture.bare), 1);
    let files = git(&fixture.bare, &["ls-tree", "-r", "--name-only", "main"]);
    assert_eq!(files, "config.json\nextra.json\npools.json");
}
