//! Application layer for relaykit.
//!
//! Ports define the seams infrastructure and presentation implement; use
//! cases orchestrate the domain layer through them. This crate depends only
//! on `relaykit-domain`.

pub mod ports;
pub mod use_cases;

pub use ports::{
    AdapterCapability, AdapterKind, AdapterMetadata, AdapterPortError, ConfirmationDecision, ConfirmationPolicy,
    DeliveryError, DeliverySink, ModelAdapter, ModelInput, ModelOutput, RateLimitDecision, RateLimiter, RenderError,
    RenderedInput, Renderer, SnapshotStore, SnapshotStoreError, ToolContext, ToolRunner,
};
pub use use_cases::{
    App, AppError, ContentPipeline, ContentPipelineConfig, DeliveryTiming, RetryConfig, SessionEngine,
    SessionEngineConfig, SessionEngineError, SessionHandle,
};
