//! The session registry. Enriched from the pack's `sven-node`/`sven-gateway`
//! `ControlService` pattern: an actor-free registry guarded by one lock,
//! handing callers a cheaply cloneable `Arc<SessionHandle>` per id.

use crate::ports::snapshot_store::{SnapshotStore, SnapshotStoreError};
use crate::use_cases::session_engine::{SessionEngine, SessionEngineError, SessionHandle};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("session '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Engine(#[from] SessionEngineError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotStoreError),
}

/// Owns every live session for one logical app (see the gateway's `appId`
/// registry). Invariant: only one live `SessionHandle` per id across the
/// process — `session()` under race returns the identical `Arc`.
pub struct App {
    engine: SessionEngine,
    snapshot_store: Option<Arc<dyn SnapshotStore>>,
    sessions: Mutex<HashMap<String, Arc<SessionHandle>>>,
    hibernated: Mutex<std::collections::HashSet<String>>,
}

impl App {
    pub fn new(engine: SessionEngine) -> Self {
        Self {
            engine,
            snapshot_store: None,
            sessions: Mutex::new(HashMap::new()),
            hibernated: Mutex::new(std::collections::HashSet::new()),
        }
    }

    pub fn with_snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshot_store = Some(store);
        self
    }

    /// Create-or-get a session. Re-hydrates from the snapshot store
    /// transparently if `id` names a hibernated session.
    pub async fn session(&self, id: impl Into<String>) -> Result<Arc<SessionHandle>, AppError> {
        let id = id.into();
        let mut sessions = self.sessions.lock().await;
        if let Some(handle) = sessions.get(&id) {
            return Ok(handle.clone());
        }

        let handle = if self.hibernated.lock().await.contains(&id) {
            let store = self.snapshot_store.as_ref().ok_or_else(|| AppError::NotFound(id.clone()))?;
            let snapshot = store.load(&id).await?;
            self.hibernated.lock().await.remove(&id);
            Arc::new(self.engine.hydrate(&snapshot))
        } else {
            Arc::new(self.engine.create_session(id.clone()))
        };

        sessions.insert(id, handle.clone());
        Ok(handle)
    }

    pub async fn has(&self, id: &str) -> bool {
        self.sessions.lock().await.contains_key(id) || self.hibernated.lock().await.contains(id)
    }

    pub async fn is_hibernated(&self, id: &str) -> bool {
        self.hibernated.lock().await.contains(id)
    }

    pub async fn hibernated_sessions(&self) -> Vec<String> {
        self.hibernated.lock().await.iter().cloned().collect()
    }

    /// Serialize the session and evict it from the live registry. Legal only
    /// when the session is idle (enforced by the engine).
    pub async fn hibernate(&self, id: &str, timestamp: i64) -> Result<(), AppError> {
        let store = self.snapshot_store.as_ref().ok_or_else(|| AppError::NotFound(id.to_string()))?;
        let handle = {
            let sessions = self.sessions.lock().await;
            sessions.get(id).cloned().ok_or_else(|| AppError::NotFound(id.to_string()))?
        };
        let snapshot = self.engine.hibernate(&handle, timestamp).await?;
        store.save(&snapshot).await?;
        self.sessions.lock().await.remove(id);
        self.hibernated.lock().await.insert(id.to_string());
        info!("hibernated session '{id}'");
        Ok(())
    }

    /// Remove a session entirely: no snapshot, no registry entry.
    pub async fn close(&self, id: &str) -> Result<(), AppError> {
        self.sessions.lock().await.remove(id).ok_or_else(|| AppError::NotFound(id.to_string()))?;
        self.hibernated.lock().await.remove(id);
        Ok(())
    }

    pub async fn list_ids(&self) -> Vec<String> {
        self.sessions.lock().await.keys().cloned().collect()
    }

    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::model_adapter::{AdapterKind, AdapterMetadata, AdapterPortError, ModelAdapter, ModelInput};
    use crate::ports::renderer::{RenderError, RenderedInput, Renderer};
    use crate::ports::tool::{ToolContext, ToolRunner};
    use async_trait::async_trait;
    use relaykit_domain::{AdapterDelta, ComponentState, StopReason, TimelineEntry, ToolCall, ToolResult, ToolSpec, Usage};

    struct StubAdapter;
    #[async_trait]
    impl ModelAdapter for StubAdapter {
        fn metadata(&self) -> AdapterMetadata {
            AdapterMetadata { id: "stub".into(), provider: "test".into(), model: None, kind: AdapterKind::Language, capabilities: vec![] }
        }
        async fn execute_stream(&self, _input: ModelInput) -> Result<futures::stream::BoxStream<'static, AdapterDelta>, AdapterPortError> {
            Ok(Box::pin(futures::stream::iter(vec![
                AdapterDelta::Text { delta: "hi".into() },
                AdapterDelta::MessageEnd { stop_reason: StopReason::Stop, usage: Some(Usage::default()) },
            ])))
        }
    }

    struct StubRenderer;
    #[async_trait]
    impl Renderer for StubRenderer {
        async fn render(&self, _cs: &ComponentState, timeline: &[TimelineEntry]) -> Result<(RenderedInput, ComponentState), RenderError> {
            Ok((RenderedInput { timeline: timeline.to_vec(), ..Default::default() }, ComponentState::new()))
        }
    }

    struct StubToolRunner(ToolSpec);
    #[async_trait]
    impl ToolRunner for StubToolRunner {
        fn tool_spec(&self) -> &ToolSpec {
            &self.0
        }
        async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> ToolResult {
            ToolResult::text_success(&call.tool_use_id, &call.tool_name, "ok")
        }
    }

    fn make_app() -> App {
        let engine = SessionEngine::new(Arc::new(StubAdapter), Arc::new(StubToolRunner(ToolSpec::new())), Arc::new(StubRenderer));
        App::new(engine)
    }

    #[tokio::test]
    async fn session_returns_identical_handle_on_repeat_lookup() {
        let app = make_app();
        let a = app.session("s1").await.unwrap();
        let b = app.session("s1").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn close_removes_session_from_registry() {
        let app = make_app();
        app.session("s1").await.unwrap();
        assert!(app.has("s1").await);
        app.close("s1").await.unwrap();
        assert!(!app.has("s1").await);
    }

    #[tokio::test]
    async fn unknown_session_close_errors() {
        let app = make_app();
        assert!(app.close("missing").await.is_err());
    }
}
