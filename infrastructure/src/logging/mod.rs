//! Logging infrastructure — structured event audit trail.
//!
//! Provides [`JsonlEventLogger`], a JSONL file writer used as an optional
//! audit log alongside `tracing`'s structured console/file output.

mod jsonl_logger;

pub use jsonl_logger::JsonlEventLogger;
