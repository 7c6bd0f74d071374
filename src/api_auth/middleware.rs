//! Authentication middleware for partner routes.
//!
//! Verification flow: extract `X-Api-Key`, look the key up, check the
//! status flag, check the required scope, then the per-key rate limit.
//! Each request gets a UUID request id attached to its log line.

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use tracing::{info, warn};

use super::error::{AuthError, AuthErrorCode};
use super::models::{AuthenticatedPartner, has_scope};
use super::rate_limit::RateLimiter;
use crate::store::MarketStore;

/// Authentication state shared across partner requests.
#[derive(Clone)]
pub struct ApiAuthState {
    pub store: Arc<dyn MarketStore>,
    pub limiter: Arc<RateLimiter>,
    /// Scope bit every request on this router must carry.
    pub required_scope: i32,
}

/// Axum middleware for partner API authentication.
///
/// Injects [`AuthenticatedPartner`] into request extensions on success.
pub async fn api_auth_middleware(
    State(state): State<ApiAuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let request_id = uuid::Uuid::new_v4();
    let api_key = extract_api_key(request.headers())?;

    let record = state
        .store
        .get_api_key(api_key)
        .await
        .map_err(|e| AuthError::new(AuthErrorCode::InternalError, format!("store error: {e}")))?
        .ok_or_else(|| AuthError::from_code(AuthErrorCode::InvalidApiKey))?;

    if !record.is_active() {
        return Err(AuthError::from_code(AuthErrorCode::ApiKeyDisabled));
    }
    if !has_scope(record.scopes, state.required_scope) {
        return Err(AuthError::from_code(AuthErrorCode::ScopeDenied));
    }
    if !state.limiter.check(&record.key) {
        warn!(%request_id, partner = %record.partner_name, "Partner rate limited");
        return Err(AuthError::from_code(AuthErrorCode::RateLimited));
    }

    info!(
        %request_id,
        partner = %record.partner_name,
        method = %request.method(),
        path = %request.uri().path(),
        "Partner request"
    );

    request.extensions_mut().insert(AuthenticatedPartner {
        key: record.key,
        partner_name: record.partner_name,
        scopes: record.scopes,
    });
    Ok(next.run(request).await)
}

/// Extract and shape-check the `X-Api-Key` header.
///
/// Format: `PK_` + 16 hex characters.
pub fn extract_api_key(headers: &HeaderMap) -> Result<&str, AuthError> {
    let key = headers
        .get("X-Api-Key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AuthError::from_code(AuthErrorCode::MissingKey))?;

    if !key.starts_with("PK_") || key.len() != 19 {
        return Err(AuthError::new(
            AuthErrorCode::InvalidApiKey,
            "API Key must be PK_ + 16 hex characters",
        ));
    }
    Ok(key)
}
