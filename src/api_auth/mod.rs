//! Partner API authentication.
//!
//! Read-only partner endpoints authenticate with an `X-Api-Key` header.
//! Keys carry a scope bitmask and a status flag; requests are rate limited
//! per key over a sliding window.
//!
//! ## Components
//! - `error`: Authentication error types (4001-4006)
//! - `models`: API Key record, scopes, and the authenticated partner
//! - `rate_limit`: per-key sliding-window limiter
//! - `middleware`: Axum authentication middleware

pub mod error;
pub mod middleware;
pub mod models;
pub mod rate_limit;

pub use error::{AuthError, AuthErrorCode};
pub use middleware::{ApiAuthState, api_auth_middleware};
pub use models::{ApiKeyRecord, AuthenticatedPartner, has_scope, scopes};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
