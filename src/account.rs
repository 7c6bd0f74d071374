//! User account profile, as seen by the trust-and-safety core.
//!
//! Account management itself lives elsewhere; this is the read model the
//! fraud gate consumes when a transaction is created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core_types::UserId;

/// Trust-relevant profile attributes for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub kyc_verified: bool,
    /// Completed transactions as either side.
    pub completed_transactions: u32,
    /// Disputes this account was a party to, any outcome.
    pub disputes: u32,
    /// Disputes resolved against this account as confirmed fraud.
    pub confirmed_fraud_disputes: u32,
    /// Request fingerprint flags from the edge (session layer fills these).
    pub new_device: bool,
    pub geo_mismatch: bool,
}

impl UserProfile {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            created_at: Utc::now(),
            email_verified: false,
            phone_verified: false,
            kyc_verified: false,
            completed_transactions: 0,
            disputes: 0,
            confirmed_fraud_disputes: 0,
            new_device: false,
            geo_mismatch: false,
        }
    }

    /// Account age in days at `now`.
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        (now - self.created_at).num_seconds().max(0) as f64 / 86_400.0
    }
}
