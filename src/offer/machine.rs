//! Offer negotiation machine.
//!
//! Drives the offer lifecycle: PENDING -> {ACCEPTED, REJECTED, COUNTERED},
//! with COUNTERED spawning a new PENDING offer owned by the other party, and
//! time-based expiry from PENDING. All transitions are CAS-guarded through
//! the store so concurrent responders race and exactly one wins.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::{Offer, OfferAccepted, OfferParty, OfferStatus};
use crate::core_types::{ListingId, OfferId, UserId};
use crate::error::CoreError;
use crate::listing::ListingStatus;
use crate::store::MarketStore;

/// Response action on a live offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferAction {
    Accept,
    Reject,
    Counter,
}

/// Result of a `respond` call.
#[derive(Debug, Clone)]
pub enum OfferOutcome {
    /// Emitted event for the escrow machine to consume.
    Accepted(OfferAccepted),
    Rejected,
    /// The newly spawned counter-offer, now awaiting the other party.
    Countered(Offer),
}

/// Negotiation tunables.
#[derive(Debug, Clone)]
pub struct NegotiationConfig {
    /// How long a PENDING offer stays respondable.
    pub offer_ttl: Duration,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            offer_ttl: Duration::hours(48),
        }
    }
}

pub struct OfferNegotiationMachine {
    store: Arc<dyn MarketStore>,
    config: NegotiationConfig,
}

impl OfferNegotiationMachine {
    pub fn new(store: Arc<dyn MarketStore>, config: NegotiationConfig) -> Self {
        Self { store, config }
    }

    /// Create a new PENDING offer from a buyer.
    ///
    /// Fails with ValidationError for non-positive amounts, inactive
    /// listings, or self-dealing; ConflictError when the buyer already has a
    /// live offer chain on this listing.
    pub async fn create_offer(
        &self,
        listing_id: ListingId,
        buyer_id: UserId,
        amount: Decimal,
        message: Option<String>,
    ) -> Result<Offer, CoreError> {
        if amount <= Decimal::ZERO {
            return Err(CoreError::validation("offer amount must be greater than zero"));
        }

        let listing = self
            .store
            .get_listing(listing_id)
            .await?
            .ok_or_else(|| CoreError::not_found("listing"))?;

        if listing.status != ListingStatus::Active {
            return Err(CoreError::validation(format!(
                "listing is not active (status {})",
                listing.status
            )));
        }
        if listing.seller_id == buyer_id {
            return Err(CoreError::validation("sellers cannot bid on their own listing"));
        }

        if self
            .store
            .find_live_offer(listing_id, buyer_id)
            .await?
            .is_some()
        {
            return Err(CoreError::conflict(
                "buyer already has a live offer on this listing",
            ));
        }

        let now = Utc::now();
        let offer = Offer {
            id: OfferId::new(),
            listing_id,
            buyer_id,
            seller_id: listing.seller_id,
            amount,
            message,
            proposed_by: OfferParty::Buyer,
            status: OfferStatus::Pending,
            parent_offer_id: None,
            created_at: now,
            expires_at: now + self.config.offer_ttl,
        };

        // The store re-checks the live-chain invariant under its own lock,
        // so two concurrent creates cannot both land.
        self.store.insert_offer(&offer).await?;

        info!(
            offer_id = %offer.id,
            listing_id = %listing_id,
            buyer_id,
            amount = %amount,
            "Offer created"
        );
        Ok(offer)
    }

    /// Respond to a live offer as its counterparty.
    pub async fn respond(
        &self,
        offer_id: OfferId,
        actor_id: UserId,
        action: OfferAction,
        counter_amount: Option<Decimal>,
        counter_message: Option<String>,
    ) -> Result<OfferOutcome, CoreError> {
        let offer = self
            .store
            .get_offer(offer_id)
            .await?
            .ok_or_else(|| CoreError::not_found("offer"))?;

        if actor_id != offer.responder() {
            return Err(CoreError::authorization(
                "only the offer's counterparty may respond",
            ));
        }
        if !offer.status.is_live() {
            return Err(CoreError::conflict(format!(
                "offer is not respondable (status {})",
                offer.status
            )));
        }
        if Utc::now() >= offer.expires_at {
            // Lazy expiry: sweep may not have reached it yet.
            self.store
                .update_offer_status_if(offer.id, OfferStatus::Pending, OfferStatus::Expired)
                .await?;
            return Err(CoreError::conflict("offer has expired"));
        }

        match action {
            OfferAction::Accept => self.accept(offer).await,
            OfferAction::Reject => self.reject(offer).await,
            OfferAction::Counter => {
                self.counter(offer, counter_amount, counter_message).await
            }
        }
    }

    async fn accept(&self, offer: Offer) -> Result<OfferOutcome, CoreError> {
        // Re-validate the listing at accept time: another accepted offer may
        // have raced this one onto the same listing.
        let listing = self
            .store
            .get_listing(offer.listing_id)
            .await?
            .ok_or_else(|| CoreError::not_found("listing"))?;
        if listing.status != ListingStatus::Active {
            return Err(CoreError::conflict(format!(
                "listing is no longer active (status {})",
                listing.status
            )));
        }

        if !self
            .store
            .update_offer_status_if(offer.id, OfferStatus::Pending, OfferStatus::Accepted)
            .await?
        {
            return Err(CoreError::conflict("offer was already responded to"));
        }

        info!(offer_id = %offer.id, listing_id = %offer.listing_id, "Offer accepted");
        Ok(OfferOutcome::Accepted(OfferAccepted {
            offer_id: offer.id,
            listing_id: offer.listing_id,
            buyer_id: offer.buyer_id,
            seller_id: offer.seller_id,
            amount: offer.amount,
        }))
    }

    async fn reject(&self, offer: Offer) -> Result<OfferOutcome, CoreError> {
        if !self
            .store
            .update_offer_status_if(offer.id, OfferStatus::Pending, OfferStatus::Rejected)
            .await?
        {
            return Err(CoreError::conflict("offer was already responded to"));
        }
        info!(offer_id = %offer.id, "Offer rejected");
        Ok(OfferOutcome::Rejected)
    }

    async fn counter(
        &self,
        offer: Offer,
        counter_amount: Option<Decimal>,
        counter_message: Option<String>,
    ) -> Result<OfferOutcome, CoreError> {
        let amount = counter_amount
            .ok_or_else(|| CoreError::validation("counter_amount is required"))?;
        if amount <= Decimal::ZERO {
            return Err(CoreError::validation(
                "counter amount must be greater than zero",
            ));
        }

        if !self
            .store
            .update_offer_status_if(offer.id, OfferStatus::Pending, OfferStatus::Countered)
            .await?
        {
            return Err(CoreError::conflict("offer was already responded to"));
        }

        let now = Utc::now();
        let counter = Offer {
            id: OfferId::new(),
            listing_id: offer.listing_id,
            buyer_id: offer.buyer_id,
            seller_id: offer.seller_id,
            amount,
            message: counter_message,
            proposed_by: offer.proposed_by.opposite(),
            status: OfferStatus::Pending,
            parent_offer_id: Some(offer.id),
            created_at: now,
            expires_at: now + self.config.offer_ttl,
        };
        self.store.insert_offer(&counter).await?;

        info!(
            offer_id = %counter.id,
            parent_offer_id = %offer.id,
            amount = %amount,
            "Counter-offer created"
        );
        Ok(OfferOutcome::Countered(counter))
    }

    /// Expire PENDING offers past their deadline. Returns the number swept.
    pub async fn expire_due(&self, limit: usize) -> Result<usize, CoreError> {
        let now = Utc::now();
        let due = self.store.find_expired_pending_offers(now, limit).await?;
        let mut swept = 0;
        for offer in due {
            if self
                .store
                .update_offer_status_if(offer.id, OfferStatus::Pending, OfferStatus::Expired)
                .await?
            {
                swept += 1;
                debug!(offer_id = %offer.id, "Offer expired");
            }
        }
        Ok(swept)
    }
}
