//! Persistence port for session hibernation.

use async_trait::async_trait;
use relaykit_domain::SessionSnapshot;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotStoreError {
    #[error("snapshot not found for session '{0}'")]
    NotFound(String),
    #[error("snapshot store backend error: {0}")]
    Backend(String),
}

/// Where hibernated sessions live between `hibernate()` and rehydration.
/// Implementations (in-memory map for tests, on-disk JSON, etc.) live in
/// infrastructure.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), SnapshotStoreError>;
    async fn load(&self, session_id: &str) -> Result<SessionSnapshot, SnapshotStoreError>;
    async fn delete(&self, session_id: &str) -> Result<(), SnapshotStoreError>;
    async fn exists(&self, session_id: &str) -> bool;
}
