//! Session entities: the timeline, lifecycle status and component state a
//! session carries between ticks.

use crate::adapter::Usage;
use crate::message::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Queued,
    Running,
    Completed,
    Aborted,
}

/// One entry in a session's timeline: a message plus renderer-facing tags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub message: Message,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TimelineEntry {
    pub fn new(message: Message) -> Self {
        Self { message, tags: Vec::new() }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Opaque per-component state the renderer reads and writes across ticks,
/// keyed by component path (e.g. `"root/counter"`).
pub type ComponentState = HashMap<String, serde_json::Value>;

/// A long-lived conversation session.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    status: SessionStatus,
    tick: u64,
    timeline: Vec<TimelineEntry>,
    queued: Vec<Message>,
    component_state: ComponentState,
    cumulative_usage: Usage,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: SessionStatus::Idle,
            tick: 0,
            timeline: Vec::new(),
            queued: Vec::new(),
            component_state: ComponentState::new(),
            cumulative_usage: Usage::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn timeline(&self) -> &[TimelineEntry] {
        &self.timeline
    }

    pub fn component_state(&self) -> &ComponentState {
        &self.component_state
    }

    pub fn component_state_mut(&mut self) -> &mut ComponentState {
        &mut self.component_state
    }

    pub fn cumulative_usage(&self) -> Usage {
        self.cumulative_usage
    }

    pub fn enqueue(&mut self, message: Message) {
        self.queued.push(message);
    }

    pub fn drain_queue(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.queued)
    }

    pub fn has_queued(&self) -> bool {
        !self.queued.is_empty()
    }

    pub fn append(&mut self, entry: TimelineEntry) {
        self.timeline.push(entry);
    }

    pub fn advance_tick(&mut self) {
        self.tick += 1;
    }

    pub fn add_usage(&mut self, usage: Usage) {
        self.cumulative_usage.input_tokens += usage.input_tokens;
        self.cumulative_usage.output_tokens += usage.output_tokens;
        self.cumulative_usage.total_tokens += usage.total_tokens;
    }

    /// Attempt `idle -> queued`. Fails (no-op) unless currently idle.
    pub fn mark_queued(&mut self) -> bool {
        if self.status == SessionStatus::Idle {
            self.status = SessionStatus::Queued;
            true
        } else {
            false
        }
    }

    pub fn mark_running(&mut self) {
        self.status = SessionStatus::Running;
    }

    pub fn mark_idle(&mut self) {
        self.status = SessionStatus::Idle;
    }

    pub fn mark_completed(&mut self) {
        self.status = SessionStatus::Completed;
    }

    pub fn mark_aborted(&mut self) {
        self.status = SessionStatus::Aborted;
        self.status = SessionStatus::Idle;
    }

    pub fn is_idle(&self) -> bool {
        self.status == SessionStatus::Idle
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    /// All known `tool_use_id`s across the timeline, used to validate that
    /// every `tool_result` correlates to a real call.
    pub fn known_tool_use_ids(&self) -> std::collections::HashSet<String> {
        self.timeline
            .iter()
            .flat_map(|e| e.message.tool_uses().map(|(id, _, _)| id.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn new_session_starts_idle_with_empty_timeline() {
        let session = Session::new("s1");
        assert_eq!(session.status(), SessionStatus::Idle);
        assert_eq!(session.tick(), 0);
        assert!(session.timeline().is_empty());
    }

    #[test]
    fn idle_to_queued_transition_succeeds_only_once() {
        let mut session = Session::new("s1");
        assert!(session.mark_queued());
        assert_eq!(session.status(), SessionStatus::Queued);
        // already queued, not idle -> no-op
        assert!(!session.mark_queued());
    }

    #[test]
    fn queue_drains_in_fifo_order() {
        let mut session = Session::new("s1");
        session.enqueue(Message::user("first"));
        session.enqueue(Message::user("second"));
        let drained = session.drain_queue();
        assert_eq!(drained[0].text_content(), "first");
        assert_eq!(drained[1].text_content(), "second");
        assert!(!session.has_queued());
    }

    #[test]
    fn cumulative_usage_accumulates_across_ticks() {
        let mut session = Session::new("s1");
        session.add_usage(Usage { input_tokens: 10, output_tokens: 5, total_tokens: 15 });
        session.add_usage(Usage { input_tokens: 3, output_tokens: 2, total_tokens: 5 });
        let usage = session.cumulative_usage();
        assert_eq!(usage.total_tokens, 20);
    }
}
