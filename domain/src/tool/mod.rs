//! Tool domain module: definitions, calls, results, validation and the
//! provider plug-in abstraction. The async execution contract itself
//! (`Tool::run`) is an application-layer port, since it requires I/O.

pub mod entities;
pub mod provider;
pub mod traits;
pub mod value_objects;

pub use entities::{ToolCall, ToolDefinition, ToolSpec};
pub use provider::{ProviderError, ToolProvider};
pub use traits::{DefaultToolValidator, ToolValidator};
pub use value_objects::{ToolError, ToolResult};
