//! RPC error taxonomy shared by every transport.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayErrorCode {
    Unauthorized,
    AuthFailed,
    InvalidMessage,
    InvalidParams,
    UnknownMethod,
    SessionNotFound,
    RateLimited,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayError {
    pub code: GatewayErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl GatewayError {
    pub fn new(code: GatewayErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), details: None }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::Unauthorized, message)
    }
    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::AuthFailed, message)
    }
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::InvalidMessage, message)
    }
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::InvalidParams, message)
    }
    pub fn unknown_method(method: &str) -> Self {
        Self::new(GatewayErrorCode::UnknownMethod, format!("unknown method: {method}"))
    }
    pub fn session_not_found(session_id: &str) -> Self {
        Self::new(GatewayErrorCode::SessionNotFound, format!("session not found: {session_id}"))
    }
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::RateLimited, message)
    }
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorCode::Internal, message)
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for GatewayError {}
