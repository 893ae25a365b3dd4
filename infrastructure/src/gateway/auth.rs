//! Gateway authentication: none, constant-time token compare, or a custom
//! validator. Constant-time comparison via `subtle`, the same crate the
//! pack's `sven-gateway` uses for per-request auth token checks.

use std::sync::Arc;
use subtle::ConstantTimeEq;

#[derive(Debug, Clone)]
pub struct AuthResult {
    pub user: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl AuthResult {
    pub fn anonymous() -> Self {
        Self { user: None, metadata: None }
    }
}

pub enum AuthMode {
    None,
    Token { expected: String },
    Custom(Arc<dyn Fn(&str) -> Option<AuthResult> + Send + Sync>),
}

impl AuthMode {
    pub fn token(expected: impl Into<String>) -> Self {
        Self::Token { expected: expected.into() }
    }

    /// `None` means no token was presented; `Some(token)` is what the client sent
    /// on its `connect` frame.
    pub fn authenticate(&self, token: Option<&str>) -> Result<AuthResult, ()> {
        match self {
            AuthMode::None => Ok(AuthResult::anonymous()),
            AuthMode::Token { expected } => {
                let Some(token) = token else { return Err(()) };
                if token.as_bytes().ct_eq(expected.as_bytes()).into() {
                    Ok(AuthResult::anonymous())
                } else {
                    Err(())
                }
            }
            AuthMode::Custom(validate) => {
                let Some(token) = token else { return Err(()) };
                validate(token).ok_or(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_mode_always_authenticates() {
        assert!(AuthMode::None.authenticate(None).is_ok());
    }

    #[test]
    fn token_mode_rejects_wrong_token() {
        let mode = AuthMode::token("secret");
        assert!(mode.authenticate(Some("wrong")).is_err());
        assert!(mode.authenticate(None).is_err());
        assert!(mode.authenticate(Some("secret")).is_ok());
    }

    #[test]
    fn custom_mode_delegates_to_closure() {
        let mode = AuthMode::Custom(Arc::new(|token: &str| {
            (token == "ok").then(|| AuthResult { user: Some("bob".into()), metadata: None })
        }));
        let result = mode.authenticate(Some("ok")).unwrap();
        assert_eq!(result.user.as_deref(), Some("bob"));
        assert!(mode.authenticate(Some("nope")).is_err());
    }
}
