//! Gateway wire types: response envelope, error mapping, session identity.

use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::{StatusCode, request::Parts};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::core_types::{Role, UserId};
use crate::error::CoreError;

/// Success envelope: `{"data": ..., "message": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            data,
            message: message.into(),
        })
    }

    pub fn ok(data: T) -> Json<Self> {
        Self::new(data, "ok")
    }
}

/// Error envelope: `{"error": CODE, "details": ...}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub details: String,
}

/// Core error carried through an axum handler.
#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: self.0.code(),
            details: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Session identity, pre-validated by the edge layer.
///
/// The edge terminates end-user authentication and forwards the verified
/// identity in `X-User-Id` / `X-User-Role`. This service trusts those
/// headers; it is never exposed to the public internet directly.
#[derive(Debug, Clone, Copy)]
pub struct SessionUser {
    pub user_id: UserId,
    pub role: Role,
}

impl SessionUser {
    pub fn require_admin(&self) -> Result<(), CoreError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(CoreError::authorization("admin privilege required"))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for SessionUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("X-User-Id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<UserId>().ok())
            .ok_or_else(|| {
                ApiError(CoreError::authentication("missing or invalid X-User-Id"))
            })?;

        let role = parts
            .headers
            .get("X-User-Role")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.parse::<Role>())
            .unwrap_or(Ok(Role::User))
            .map_err(|_| ApiError(CoreError::authentication("invalid X-User-Role")))?;

        Ok(SessionUser { user_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let err = ApiError(CoreError::conflict("offer was already responded to"));
        let body = ErrorBody {
            error: err.0.code(),
            details: err.0.to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "CONFLICT");
        assert_eq!(json["details"], "offer was already responded to");
    }

    #[test]
    fn test_require_admin() {
        let user = SessionUser {
            user_id: 1,
            role: Role::User,
        };
        assert!(user.require_admin().is_err());
        let admin = SessionUser {
            user_id: 2,
            role: Role::Admin,
        };
        assert!(admin.require_admin().is_ok());
    }
}
