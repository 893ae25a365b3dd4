//! Serializable session state, produced by `hibernate()` and consumed by
//! rehydration.

use super::entities::{ComponentState, Session, TimelineEntry};
use crate::adapter::Usage;
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: u32,
    pub session_id: String,
    pub tick: u64,
    pub timeline: Vec<TimelineEntry>,
    pub component_state: ComponentState,
    pub usage: Usage,
    /// Unix millis; stamped by the caller since the domain layer has no clock.
    pub timestamp: i64,
}

impl SessionSnapshot {
    pub fn capture(session: &Session, timestamp: i64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            session_id: session.id().to_string(),
            tick: session.tick(),
            timeline: session.timeline().to_vec(),
            component_state: session.component_state().clone(),
            usage: session.cumulative_usage(),
            timestamp,
        }
    }

    /// Rehydrate a session from this snapshot. The round-trip invariant is
    /// that a freshly `capture`d snapshot of the result equals `self` modulo
    /// `timestamp`.
    pub fn hydrate(&self) -> Session {
        let mut session = Session::new(self.session_id.clone());
        for entry in &self.timeline {
            session.append(entry.clone());
        }
        *session.component_state_mut() = self.component_state.clone();
        session.add_usage(self.usage);
        for _ in 0..self.tick {
            session.advance_tick();
        }
        session
    }
}
