//! Application use cases: the orchestration built on top of the ports.

pub mod app;
pub mod content_pipeline;
pub mod session_engine;

pub use app::{App, AppError};
pub use content_pipeline::{ContentPipeline, ContentPipelineConfig, DeliveryTiming, RetryConfig};
pub use session_engine::{SessionEngine, SessionEngineConfig, SessionEngineError, SessionHandle};
