//! Core concepts shared across all domain subdomains.
//!
//! - [`error::DomainError`] — cross-subsystem domain errors
//! - [`string`] — small text helpers shared by the content pipeline summarizers

pub mod error;
pub mod string;
