//! Trait contract tests for TapeStore.
//!
//! Every check runs against both the in-memory fake and the JSONL file store.
//! Any conforming implementation must pass these.

use std::sync::Arc;

use serde_json::json;
use tape_state::{EntryKind, FileTapeStore, MemoryTapeStore, NewEntry, StoreError, TapeStore};

fn file_store() -> (tempfile::TempDir, FileTapeStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = FileTapeStore::open_workspace(dir.path().join("home"), dir.path()).unwrap();
    (dir, store)
}

async fn assert_append_monotonic(store: &dyn TapeStore) {
    let mut previous = 0;
    for i in 0..20 {
        let id = store
            .append(NewEntry::message("user", format!("msg {i}")))
            .await
            .unwrap();
        assert_eq!(id, previous + 1);
        previous = id;
    }
}

async fn assert_read_is_ordered_and_complete(store: &dyn TapeStore) {
    store.append(NewEntry::system("a")).await.unwrap();
    store
        .append(NewEntry::anchor("session/start", Default::default()))
        .await
        .unwrap();
    store
        .append(NewEntry::tool_result("fs.read", json!("ok")))
        .await
        .unwrap();

    let entries = store.read_all().await.unwrap();
    let kinds: Vec<&str> = entries.iter().map(|e| e.kind.as_str()).collect();
    assert_eq!(kinds, vec!["system", "anchor", "tool_result"]);
    assert!(entries.windows(2).all(|w| w[0].id < w[1].id));
}

async fn assert_archive_clears(store: &dyn TapeStore) {
    store.append(NewEntry::system("before")).await.unwrap();
    let archived = store.archive_and_clear().await.unwrap();
    assert!(archived.is_some());
    assert!(store.read_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn memory_store_append_monotonic() {
    assert_append_monotonic(&MemoryTapeStore::new()).await;
}

#[tokio::test]
async fn file_store_append_monotonic() {
    let (_dir, store) = file_store();
    assert_append_monotonic(&store).await;
}

#[tokio::test]
async fn memory_store_read_ordered() {
    assert_read_is_ordered_and_complete(&MemoryTapeStore::new()).await;
}

#[tokio::test]
async fn file_store_read_ordered() {
    let (_dir, store) = file_store();
    assert_read_is_ordered_and_complete(&store).await;
}

#[tokio::test]
async fn memory_store_archive_clears() {
    assert_archive_clears(&MemoryTapeStore::new()).await;
}

#[tokio::test]
async fn file_store_archive_clears() {
    let (_dir, store) = file_store();
    assert_archive_clears(&store).await;
}

#[tokio::test]
async fn memory_store_reports_unavailable_medium() {
    let store = MemoryTapeStore::new();
    store.fail_appends(true);
    let err = store.append(NewEntry::system("x")).await.unwrap_err();
    assert!(matches!(err, StoreError::Unavailable(_)));
    assert!(store.is_empty());
}

#[tokio::test]
async fn metadata_round_trips_through_file() {
    let (_dir, store) = file_store();
    store
        .append(NewEntry::message("user", "hi").with_meta("turn", json!(3)))
        .await
        .unwrap();
    let entries = store.read_all().await.unwrap();
    assert_eq!(entries[0].kind, EntryKind::Message);
    assert_eq!(entries[0].meta["turn"], 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn file_store_assigns_unique_ids_under_concurrency() {
    let (_dir, store) = file_store();
    let store = Arc::new(store);

    let workers = 8;
    let per_worker = 40;
    let mut handles = Vec::new();
    for batch in 0..workers {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            for offset in 0..per_worker {
                store
                    .append(NewEntry::message("user", format!("{batch}:{offset}")))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let ids: Vec<u64> = store
        .read_all()
        .await
        .unwrap()
        .iter()
        .map(|e| e.id)
        .collect();
    let expected: Vec<u64> = (1..=(workers * per_worker) as u64).collect();
    assert_eq!(ids, expected);
}
