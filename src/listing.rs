//! Listing entity and its closed status type.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{ListingId, TransactionId, UserId};

/// Listing lifecycle states.
///
/// Status ids are designed for storage as SMALLINT.
/// Terminal states: SOLD (30), EXPIRED (-10), CANCELLED (-20).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum ListingStatus {
    Draft = 0,
    Active = 10,
    /// Held by an open transaction (see `Listing::reserved_by`).
    Reserved = 20,
    Sold = 30,
    Expired = -10,
    Cancelled = -20,
}

impl ListingStatus {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ListingStatus::Sold | ListingStatus::Expired | ListingStatus::Cancelled
        )
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(ListingStatus::Draft),
            10 => Some(ListingStatus::Active),
            20 => Some(ListingStatus::Reserved),
            30 => Some(ListingStatus::Sold),
            -10 => Some(ListingStatus::Expired),
            -20 => Some(ListingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Draft => "DRAFT",
            ListingStatus::Active => "ACTIVE",
            ListingStatus::Reserved => "RESERVED",
            ListingStatus::Sold => "SOLD",
            ListingStatus::Expired => "EXPIRED",
            ListingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reservation offered for transfer.
///
/// `asking_price <= original_price` is a soft rule: violations are scored by
/// the fraud engine, not enforced here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub slug: String,
    pub seller_id: UserId,
    pub category: String,
    pub original_price: Decimal,
    pub asking_price: Decimal,
    pub status: ListingStatus,
    /// Transaction currently holding the reservation, while RESERVED/SOLD.
    /// Reactivation checks this so a listing sold through a different
    /// transaction is never reopened.
    pub reserved_by: Option<TransactionId>,
    pub event_date: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn new(
        seller_id: UserId,
        slug: impl Into<String>,
        category: impl Into<String>,
        original_price: Decimal,
        asking_price: Decimal,
        event_date: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ListingId::new(),
            slug: slug.into(),
            seller_id,
            category: category.into(),
            original_price,
            asking_price,
            status: ListingStatus::Active,
            reserved_by: None,
            event_date,
            published_at: now,
            updated_at: now,
        }
    }

    /// Hours since publication, for the fraud listing-age signal.
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        (now - self.published_at).num_seconds().max(0) as f64 / 3600.0
    }

    /// Price deviation from the original price: |asking - original| / original.
    pub fn price_deviation(&self) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;
        if self.original_price <= Decimal::ZERO {
            return None;
        }
        let dev = (self.asking_price - self.original_price).abs() / self.original_price;
        dev.to_f64()
    }
}
