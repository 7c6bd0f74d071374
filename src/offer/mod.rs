//! Offer negotiation.
//!
//! An offer chain is the linked sequence of PENDING/COUNTERED offers between
//! one buyer and one seller on one listing, terminating in
//! ACCEPTED/REJECTED/EXPIRED. Chains are append-only: countered offers are
//! never deleted, they reference their successor's parent.
//!
//! ## Components
//! - `machine`: create/respond/expire operations with CAS transitions

pub mod machine;

pub use machine::{NegotiationConfig, OfferAction, OfferNegotiationMachine, OfferOutcome};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{ListingId, OfferId, UserId};

/// Offer lifecycle states.
///
/// Status ids are designed for storage as SMALLINT.
/// Terminal states: ACCEPTED (10), REJECTED (-10), EXPIRED (-20).
/// COUNTERED (20) is terminal for the individual offer but the chain
/// continues through the spawned successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum OfferStatus {
    Pending = 0,
    Accepted = 10,
    Countered = 20,
    Rejected = -10,
    Expired = -20,
}

impl OfferStatus {
    /// Whether this offer still awaits a response.
    #[inline]
    pub fn is_live(&self) -> bool {
        matches!(self, OfferStatus::Pending)
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(OfferStatus::Pending),
            10 => Some(OfferStatus::Accepted),
            20 => Some(OfferStatus::Countered),
            -10 => Some(OfferStatus::Rejected),
            -20 => Some(OfferStatus::Expired),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Pending => "PENDING",
            OfferStatus::Accepted => "ACCEPTED",
            OfferStatus::Countered => "COUNTERED",
            OfferStatus::Rejected => "REJECTED",
            OfferStatus::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which side proposed this offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum OfferParty {
    Buyer = 0,
    Seller = 1,
}

impl OfferParty {
    pub fn opposite(&self) -> Self {
        match self {
            OfferParty::Buyer => OfferParty::Seller,
            OfferParty::Seller => OfferParty::Buyer,
        }
    }

    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(OfferParty::Buyer),
            1 => Some(OfferParty::Seller),
            _ => None,
        }
    }
}

/// A buyer's (or counter-offering seller's) proposed price for a listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub listing_id: ListingId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub amount: Decimal,
    pub message: Option<String>,
    pub proposed_by: OfferParty,
    pub status: OfferStatus,
    /// The offer this one superseded via counter, forming the chain.
    pub parent_offer_id: Option<OfferId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Offer {
    /// The user expected to respond to this offer.
    pub fn responder(&self) -> UserId {
        match self.proposed_by {
            OfferParty::Buyer => self.seller_id,
            OfferParty::Seller => self.buyer_id,
        }
    }
}

/// Event emitted when an offer is accepted, consumed by the escrow machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferAccepted {
    pub offer_id: OfferId,
    pub listing_id: ListingId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_id_roundtrip() {
        let all = [
            OfferStatus::Pending,
            OfferStatus::Accepted,
            OfferStatus::Countered,
            OfferStatus::Rejected,
            OfferStatus::Expired,
        ];
        for s in all {
            assert_eq!(OfferStatus::from_id(s.id()), Some(s));
        }
        assert_eq!(OfferStatus::from_id(7), None);
    }

    #[test]
    fn test_only_pending_is_live() {
        assert!(OfferStatus::Pending.is_live());
        assert!(!OfferStatus::Accepted.is_live());
        assert!(!OfferStatus::Countered.is_live());
        assert!(!OfferStatus::Rejected.is_live());
        assert!(!OfferStatus::Expired.is_live());
    }

    #[test]
    fn test_responder_flips_with_proposer() {
        let mut offer = Offer {
            id: OfferId::new(),
            listing_id: ListingId::new(),
            buyer_id: 100,
            seller_id: 200,
            amount: Decimal::from(50),
            message: None,
            proposed_by: OfferParty::Buyer,
            status: OfferStatus::Pending,
            parent_offer_id: None,
            created_at: Utc::now(),
            expires_at: Utc::now(),
        };
        assert_eq!(offer.responder(), 200);
        offer.proposed_by = OfferParty::Seller;
        assert_eq!(offer.responder(), 100);
    }
}
