//! API Key models and scope flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scope bitmask values for partner keys.
pub mod scopes {
    /// Read listings, categories, stats.
    pub const READ: i32 = 0x1;
    /// Reserved for future write surfaces.
    pub const WRITE: i32 = 0x2;
}

/// Check a scope bit against a key's mask.
pub fn has_scope(mask: i32, scope: i32) -> bool {
    mask & scope == scope
}

/// A partner API key as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// The key string itself, `PK_` + 16 hex characters.
    pub key: String,
    pub partner_name: String,
    /// Scope bitmask; see [`scopes`].
    pub scopes: i32,
    /// 1 = active, 0 = disabled.
    pub status: i16,
    pub created_at: DateTime<Utc>,
}

impl ApiKeyRecord {
    pub fn new(key: impl Into<String>, partner_name: impl Into<String>, scopes: i32) -> Self {
        Self {
            key: key.into(),
            partner_name: partner_name.into(),
            scopes,
            status: 1,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == 1
    }
}

/// Identity injected into request extensions after authentication.
#[derive(Debug, Clone)]
pub struct AuthenticatedPartner {
    pub key: String,
    pub partner_name: String,
    pub scopes: i32,
}
