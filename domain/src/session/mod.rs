//! Session domain: the long-lived conversation state the engine advances one
//! tick at a time, plus its serializable snapshot form.

pub mod entities;
pub mod snapshot;

pub use entities::{ComponentState, Session, SessionStatus, TimelineEntry};
pub use snapshot::{SessionSnapshot, SNAPSHOT_VERSION};
