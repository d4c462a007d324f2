use std::fs;
use std::sync::{Arc, Mutex};

use clip_publisher_core::ledger::{
    DurableStore, FileStore, Ledger, MockDurableStore, PersistenceError, PublicationRecord,
};
use tempfile::tempdir;

#[test]
fn test_load_missing_document_is_empty() {
    let dir = tempdir().unwrap();
    let ledger = Ledger::load(FileStore::new(dir.path().join("state.json")));
    assert!(ledger.is_empty());
    assert!(!ledger.is_published("anything.mp4"));
}

#[test]
fn test_load_corrupt_document_is_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(&path, b"{ this is not json").unwrap();

    let ledger = Ledger::load(FileStore::new(&path));
    assert!(ledger.is_empty(), "Corrupt ledger should load as empty");
}

#[test]
fn test_commit_persists_immediately_and_reloads_identically() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("state.json");

    let mut ledger = Ledger::load(FileStore::new(&path));
    ledger
        .commit(PublicationRecord::published("clips/a.mp4", "vid-a"))
        .expect("first commit");
    assert!(path.exists(), "Document must exist right after the first commit");

    ledger
        .commit(PublicationRecord::published("clips/b.mp4", "vid-b"))
        .expect("second commit");

    let reloaded = Ledger::load(FileStore::new(&path));
    let before: Vec<_> = ledger.records().cloned().collect();
    let after: Vec<_> = reloaded.records().cloned().collect();
    assert_eq!(before, after, "Reload must reproduce the committed mapping");
    assert!(reloaded.is_published("clips/a.mp4"));
    assert_eq!(
        reloaded.get("clips/b.mp4").and_then(|r| r.platform_id.as_deref()),
        Some("vid-b")
    );
}

#[test]
fn test_document_uses_record_field_names() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    let mut ledger = Ledger::load(FileStore::new(&path));
    ledger
        .commit(PublicationRecord::published("a.mp4", "vid-a"))
        .unwrap();

    let doc: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    let record = &doc["a.mp4"];
    assert_eq!(record["published"], serde_json::Value::Bool(true));
    assert_eq!(record["platform_id"], "vid-a");
    assert!(record["committed_at"].is_string());
    assert!(record.get("item_id").is_none(), "Key is carried by the map");
}

#[test]
fn test_published_record_is_never_overwritten() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    let mut ledger = Ledger::load(FileStore::new(&path));

    ledger
        .commit(PublicationRecord::published("a.mp4", "first"))
        .unwrap();
    ledger
        .commit(PublicationRecord::published("a.mp4", "second"))
        .unwrap();

    let reloaded = Ledger::load(FileStore::new(&path));
    assert_eq!(
        reloaded.get("a.mp4").and_then(|r| r.platform_id.as_deref()),
        Some("first")
    );
}

#[test]
fn test_commit_merges_records_written_by_another_writer() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");

    let mut first = Ledger::load(FileStore::new(&path));
    let mut second = Ledger::load(FileStore::new(&path));

    first
        .commit(PublicationRecord::published("a.mp4", "vid-a"))
        .unwrap();
    second
        .commit(PublicationRecord::published("b.mp4", "vid-b"))
        .unwrap();

    let reloaded = Ledger::load(FileStore::new(&path));
    assert!(reloaded.is_published("a.mp4"), "Other writer's record was lost");
    assert!(reloaded.is_published("b.mp4"));
}

#[test]
fn test_unwritable_store_keeps_commit_in_memory() {
    let mut store = MockDurableStore::new();
    store.expect_read().returning(|| Ok(None));
    store.expect_atomic_write().times(1).returning(|_| {
        Err(PersistenceError::Write {
            path: "/readonly/state.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
        })
    });

    let mut ledger = Ledger::load(store);
    let result = ledger.commit(PublicationRecord::published("a.mp4", "vid-a"));

    assert!(matches!(result, Err(PersistenceError::Write { .. })));
    assert!(
        ledger.is_published("a.mp4"),
        "In-memory ledger must still know about the publish"
    );
}

#[test]
fn test_unreadable_store_loads_empty() {
    let mut store = MockDurableStore::new();
    store.expect_read().returning(|| {
        Err(PersistenceError::Read {
            path: "state.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        })
    });
    let ledger = Ledger::load(store);
    assert!(ledger.is_empty());
}

/// Store that keeps the last written document in memory.
#[derive(Clone, Default)]
struct SharedStore {
    doc: Arc<Mutex<Option<Vec<u8>>>>,
}

impl DurableStore for SharedStore {
    fn read(&self) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(self.doc.lock().unwrap().clone())
    }

    fn atomic_write(&self, bytes: &[u8]) -> Result<(), PersistenceError> {
        *self.doc.lock().unwrap() = Some(bytes.to_vec());
        Ok(())
    }
}

#[test]
fn test_each_commit_rewrites_the_full_mapping() {
    let store = SharedStore::default();
    let mut ledger = Ledger::load(store.clone());

    for (i, id) in ["a.mp4", "b.mp4", "c.mp4"].iter().enumerate() {
        ledger
            .commit(PublicationRecord::published(*id, format!("vid-{i}")))
            .unwrap();
        let doc: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(store.doc.lock().unwrap().as_deref().unwrap()).unwrap();
        assert_eq!(doc.len(), i + 1, "Document must hold every committed record");
    }
}
