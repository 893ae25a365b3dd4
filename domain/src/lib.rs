//! Domain layer for relaykit.
//!
//! Pure business logic and entities for the session runtime: the message and
//! content-block model, the provider-independent adapter protocol, the tool
//! registry, the session's timeline and snapshot, the event bus, and the
//! guard/content-policy taxonomies. No I/O lives here.

pub mod adapter;
pub mod content;
pub mod core;
pub mod event;
pub mod guard;
pub mod message;
pub mod session;
pub mod tool;

pub use adapter::{AdapterAccumulator, AdapterDelta, AdapterError, StopReason, Usage};
pub use content::ContentPolicy;
pub use core::error::DomainError;
pub use event::{EventBuffer, StreamEvent, Subscriber};
pub use guard::{GuardEnvelope, GuardError, GuardRule, RuleAction, ToolGuardrail};
pub use message::{ContentBlock, MediaSource, Message, Role};
pub use session::{ComponentState, Session, SessionSnapshot, SessionStatus, TimelineEntry};
pub use tool::{ToolCall, ToolDefinition, ToolError, ToolProvider, ToolResult, ToolSpec};
