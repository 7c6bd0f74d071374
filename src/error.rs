//! Crate-wide error taxonomy.
//!
//! Every failure surfaced to a caller carries a stable kind (`code()`) and a
//! human-readable message. Nothing is silently swallowed except explicitly
//! defined no-op cases (idempotent webhook replays).

use thiserror::Error;

/// Core error taxonomy.
///
/// Error codes are stable API contract; messages are free-form.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Malformed or out-of-domain input. Never produced by the scoring engine.
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid identity.
    #[error("{0}")]
    Authentication(String),

    /// Identity valid, insufficient privilege for the requested transition.
    #[error("{0}")]
    Authorization(String),

    /// Referenced entity absent.
    #[error("{0} not found")]
    NotFound(String),

    /// Requested transition invalid from the current state, or a
    /// precondition mismatch under concurrent write.
    #[error("{0}")]
    Conflict(String),

    /// Payment-gateway call failed or returned an unexpected shape.
    #[error("payment provider error: {0}")]
    Provider(String),

    /// Per-key quota exceeded.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Storage failure. Reported, never masked.
    #[error("store error: {0}")]
    Store(String),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        CoreError::Authentication(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        CoreError::Authorization(msg.into())
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        CoreError::NotFound(entity.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        CoreError::Conflict(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        CoreError::Provider(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        CoreError::Store(msg.into())
    }

    /// Stable error kind for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::Authentication(_) => "AUTHENTICATION_ERROR",
            CoreError::Authorization(_) => "AUTHORIZATION_ERROR",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::Provider(_) => "PROVIDER_ERROR",
            CoreError::RateLimited => "RATE_LIMITED",
            CoreError::Store(_) => "STORE_ERROR",
        }
    }

    /// HTTP status code suggestion.
    pub fn http_status(&self) -> u16 {
        match self {
            CoreError::Validation(_) => 400,
            CoreError::Authentication(_) => 401,
            CoreError::Authorization(_) => 403,
            CoreError::NotFound(_) => 404,
            CoreError::Conflict(_) => 409,
            CoreError::RateLimited => 429,
            CoreError::Provider(_) => 502,
            CoreError::Store(_) => 500,
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        CoreError::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(CoreError::validation("bad").code(), "VALIDATION_ERROR");
        assert_eq!(CoreError::conflict("busy").code(), "CONFLICT");
        assert_eq!(CoreError::RateLimited.code(), "RATE_LIMITED");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(CoreError::validation("x").http_status(), 400);
        assert_eq!(CoreError::authentication("x").http_status(), 401);
        assert_eq!(CoreError::authorization("x").http_status(), 403);
        assert_eq!(CoreError::not_found("x").http_status(), 404);
        assert_eq!(CoreError::conflict("x").http_status(), 409);
        assert_eq!(CoreError::RateLimited.http_status(), 429);
        assert_eq!(CoreError::provider("x").http_status(), 502);
        assert_eq!(CoreError::store("x").http_status(), 500);
    }

    #[test]
    fn test_display() {
        let e = CoreError::not_found("transaction");
        assert_eq!(e.to_string(), "transaction not found");
    }
}
