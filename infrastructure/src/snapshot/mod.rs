//! `SnapshotStore` implementations: an in-memory map for tests and an
//! on-disk JSON store for real hibernation, one file per session
//! (serialize, write, no partial-write recovery attempted).

use async_trait::async_trait;
use relaykit_application::ports::snapshot_store::{SnapshotStore, SnapshotStoreError};
use relaykit_domain::SessionSnapshot;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemorySnapshotStore {
    snapshots: Mutex<HashMap<String, SessionSnapshot>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotStoreError> {
        self.snapshots.lock().unwrap().insert(snapshot.session_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<SessionSnapshot, SnapshotStoreError> {
        self.snapshots
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| SnapshotStoreError::NotFound(session_id.to_string()))
    }

    async fn delete(&self, session_id: &str) -> Result<(), SnapshotStoreError> {
        self.snapshots.lock().unwrap().remove(session_id);
        Ok(())
    }

    async fn exists(&self, session_id: &str) -> bool {
        self.snapshots.lock().unwrap().contains_key(session_id)
    }
}

/// Persists one JSON file per session under `dir`, named `<session_id>.json`.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotStoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| SnapshotStoreError::Backend(e.to_string()))?;
        let json = serde_json::to_vec_pretty(snapshot).map_err(|e| SnapshotStoreError::Backend(e.to_string()))?;
        std::fs::write(self.path_for(&snapshot.session_id), json).map_err(|e| SnapshotStoreError::Backend(e.to_string()))
    }

    async fn load(&self, session_id: &str) -> Result<SessionSnapshot, SnapshotStoreError> {
        let path = self.path_for(session_id);
        let bytes = std::fs::read(&path).map_err(|_| SnapshotStoreError::NotFound(session_id.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| SnapshotStoreError::Backend(e.to_string()))
    }

    async fn delete(&self, session_id: &str) -> Result<(), SnapshotStoreError> {
        match std::fs::remove_file(self.path_for(session_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SnapshotStoreError::Backend(e.to_string())),
        }
    }

    async fn exists(&self, session_id: &str) -> bool {
        self.path_for(session_id).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaykit_domain::Session;

    fn snapshot(id: &str) -> SessionSnapshot {
        SessionSnapshot::capture(&Session::new(id), 0)
    }

    #[tokio::test]
    async fn in_memory_store_round_trips() {
        let store = InMemorySnapshotStore::new();
        store.save(&snapshot("s1")).await.unwrap();
        assert!(store.exists("s1").await);
        let loaded = store.load("s1").await.unwrap();
        assert_eq!(loaded.session_id, "s1");
        store.delete("s1").await.unwrap();
        assert!(!store.exists("s1").await);
    }

    #[tokio::test]
    async fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        store.save(&snapshot("s1")).await.unwrap();
        assert!(store.exists("s1").await);
        let loaded = store.load("s1").await.unwrap();
        assert_eq!(loaded.session_id, "s1");
        store.delete("s1").await.unwrap();
        assert!(!store.exists("s1").await);
    }

    #[tokio::test]
    async fn missing_snapshot_is_not_found() {
        let store = InMemorySnapshotStore::new();
        assert!(matches!(store.load("nope").await, Err(SnapshotStoreError::NotFound(_))));
    }
}
