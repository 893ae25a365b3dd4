pub mod app;
pub mod gateway;
pub mod guardrail;
pub mod model;
pub mod rate_limit;
pub mod transport;
