//! Infrastructure layer for relaykit.
//!
//! This crate implements the ports defined in the application layer:
//! built-in tools, the reference `EchoAdapter`, a minimal `SimpleRenderer`,
//! snapshot stores, the gateway (auth, RPC dispatch, client event
//! buffering), the client-side multiplexer, rate limiting, config file
//! loading, and logging adapters.

pub mod adapters;
pub mod config;
pub mod gateway;
pub mod logging;
pub mod multiplexer;
pub mod rate_limiter;
pub mod renderer;
pub mod snapshot;
pub mod tools;

pub use adapters::EchoAdapter;
pub use config::{ConfigLoader, FileConfig};
pub use gateway::{AuthMode, AuthResult, ClientEventBuffer, ClientSink, Gateway, GatewayError, GatewayErrorCode, OverflowPolicy};
pub use logging::JsonlEventLogger;
pub use multiplexer::{BridgeMessage, BroadcastBus, MultiplexerTab};
pub use rate_limiter::{RateLimitDecision, RateLimiter};
pub use renderer::SimpleRenderer;
pub use snapshot::{FileSnapshotStore, InMemorySnapshotStore};
pub use tools::{
    default_tool_spec, read_only_tool_spec, registry::BuiltinProvider, registry::ToolRegistry,
    summarizer::BuiltinToolSummarizer, LocalToolRunner,
};
