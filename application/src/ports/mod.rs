//! Application ports: the seams infrastructure/presentation implement.

pub mod confirmation;
pub mod delivery;
pub mod model_adapter;
pub mod normalize;
pub mod rate_limit;
pub mod renderer;
pub mod snapshot_store;
pub mod tool;

pub use confirmation::{ConfirmationDecision, ConfirmationPolicy};
pub use delivery::{DeliveryError, DeliverySink};
pub use model_adapter::{
    AdapterCapability, AdapterKind, AdapterMetadata, AdapterPortError, ModelAdapter, ModelInput, ModelOutput,
};
pub use rate_limit::{RateLimitDecision, RateLimiter};
pub use renderer::{RenderError, RenderedInput, Renderer};
pub use snapshot_store::{SnapshotStore, SnapshotStoreError};
pub use tool::{ToolContext, ToolRunner};
