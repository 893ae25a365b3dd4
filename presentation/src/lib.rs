//! Presentation layer for relaykit.
//!
//! Concrete wire transports built on top of the gateway's `ClientSink`
//! seam: WebSocket, Unix domain socket, HTTP+SSE, a Socket.IO-flavored
//! shim, and an in-process transport for tests. Every transport speaks
//! the same `ClientFrame`/`ServerFrame`/`ChannelEvent` vocabulary and
//! dispatches through a shared `relaykit_infrastructure::Gateway`.

pub mod channel_event;
pub mod frame;
pub mod http_sse;
pub mod in_process;
pub mod socketio;
pub mod unix_socket;
pub mod websocket;

pub use channel_event::{ChannelEvent, ChannelEventMetadata, CHANNEL_EVENTS, CHANNEL_MESSAGES};
pub use frame::{ClientFrame, ServerFrame, CLOSE_AUTH_FAILED, CLOSE_BUFFER_OVERFLOW, CLOSE_SERVER_SHUTDOWN};
pub use http_sse::{events_get, events_post};
pub use in_process::InProcessSink;
pub use socketio::socketio_handler;
pub use unix_socket::serve as serve_unix_socket;
pub use websocket::{handle_socket, ws_handler};
