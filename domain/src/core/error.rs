//! Shared domain error taxonomy.

use thiserror::Error;

/// Top-level domain error.
///
/// Subsystem-specific errors ([`crate::tool::ToolError`], [`crate::adapter::AdapterError`],
/// [`crate::guard::GuardError`]) are kept as their own enums close to the code that raises
/// them; this type is for failures that cross subsystem boundaries inside the domain layer
/// itself (e.g. rebuilding a session from a corrupt snapshot).
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl DomainError {
    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}
