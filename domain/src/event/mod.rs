//! The session event bus: [`EventBuffer`], its [`Subscriber`] cursor, and the
//! [`StreamEvent`] payload it carries.

pub mod buffer;
pub mod stream_event;

pub use buffer::{EventBuffer, SubscriptionId, Subscriber};
pub use stream_event::StreamEvent;
