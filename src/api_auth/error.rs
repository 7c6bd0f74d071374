//! Authentication error types.
//!
//! Provides structured error codes for partner API authentication failures.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Authentication error codes (4001-4006).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum AuthErrorCode {
    /// 4001: X-Api-Key header missing or malformed
    MissingKey = 4001,
    /// 4002: API Key unknown
    InvalidApiKey = 4002,
    /// 4003: API Key is disabled
    ApiKeyDisabled = 4003,
    /// 4004: Key lacks the required scope
    ScopeDenied = 4004,
    /// 4005: Per-key rate limit exceeded
    RateLimited = 4005,
    /// 4006: Internal server error
    InternalError = 4006,
}

impl AuthErrorCode {
    /// Get error code as i32.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Get error name string.
    pub fn name(self) -> &'static str {
        match self {
            Self::MissingKey => "MISSING_KEY",
            Self::InvalidApiKey => "INVALID_API_KEY",
            Self::ApiKeyDisabled => "API_KEY_DISABLED",
            Self::ScopeDenied => "SCOPE_DENIED",
            Self::RateLimited => "RATE_LIMITED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code.
    pub fn http_status(self) -> StatusCode {
        match self {
            Self::ScopeDenied => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

/// Authentication error with message.
#[derive(Debug, Clone)]
pub struct AuthError {
    pub code: AuthErrorCode,
    pub message: String,
}

impl AuthError {
    /// Create a new auth error.
    pub fn new(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create error with default message.
    pub fn from_code(code: AuthErrorCode) -> Self {
        let message = match code {
            AuthErrorCode::MissingKey => "Missing X-Api-Key header",
            AuthErrorCode::InvalidApiKey => "Invalid or unknown API Key",
            AuthErrorCode::ApiKeyDisabled => "API Key is disabled",
            AuthErrorCode::ScopeDenied => "API Key lacks the required scope",
            AuthErrorCode::RateLimited => "Rate limit exceeded for this API Key",
            AuthErrorCode::InternalError => "Internal server error",
        };
        Self::new(code, message)
    }
}

/// JSON response body for auth errors.
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub code: i32,
    pub error: &'static str,
    pub message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = AuthErrorResponse {
            code: self.code.code(),
            error: self.code.name(),
            message: self.message,
        };
        (self.code.http_status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AuthErrorCode::MissingKey.code(), 4001);
        assert_eq!(AuthErrorCode::InternalError.code(), 4006);
    }

    #[test]
    fn test_error_names() {
        assert_eq!(AuthErrorCode::InvalidApiKey.name(), "INVALID_API_KEY");
        assert_eq!(AuthErrorCode::RateLimited.name(), "RATE_LIMITED");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(
            AuthErrorCode::InvalidApiKey.http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthErrorCode::ScopeDenied.http_status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthErrorCode::RateLimited.http_status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_error_from_code() {
        let err = AuthError::from_code(AuthErrorCode::ApiKeyDisabled);
        assert_eq!(err.code, AuthErrorCode::ApiKeyDisabled);
        assert!(err.message.contains("disabled"));
    }
}
