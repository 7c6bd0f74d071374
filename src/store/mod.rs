//! Persistence port.
//!
//! Every state machine talks to storage through [`MarketStore`]. The
//! contract that makes the machines safe is the `..._if` family: each is a
//! compare-and-set that writes only when the row is still in the expected
//! state and reports whether it landed. Backends must make these atomic
//! (conditional UPDATE in Postgres, a single lock in memory).

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::account::UserProfile;
use crate::api_auth::ApiKeyRecord;
use crate::core_types::{DisputeId, ListingId, OfferId, TransactionId, UserId};
use crate::dispute::{Dispute, Resolution};
use crate::error::CoreError;
use crate::escrow::{Payment, PaymentAdjustment, PaymentStatus, Transaction, TransactionStatus};
use crate::listing::{Listing, ListingStatus};
use crate::offer::{Offer, OfferStatus};

/// Marketplace aggregate counters for the partner stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MarketStats {
    pub listings_total: u64,
    pub listings_active: u64,
    pub offers_total: u64,
    pub transactions_total: u64,
    pub transactions_completed: u64,
    pub disputes_open: u64,
    /// Sum of gross amounts over completed transactions.
    pub gross_volume: Decimal,
}

#[async_trait]
pub trait MarketStore: Send + Sync {
    // -- listings --

    async fn insert_listing(&self, listing: &Listing) -> Result<(), CoreError>;

    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>, CoreError>;

    async fn list_listings(
        &self,
        status: Option<ListingStatus>,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Listing>, CoreError>;

    /// CAS: move the listing `expected -> new` and set the reservation
    /// holder. Returns false when the listing was not in `expected`.
    async fn update_listing_status_if(
        &self,
        id: ListingId,
        expected: ListingStatus,
        new: ListingStatus,
        holder: Option<TransactionId>,
    ) -> Result<bool, CoreError>;

    /// CAS: move a RESERVED listing to `to`, but only if `holder` is the
    /// transaction that reserved it. A listing reserved (or sold) through a
    /// different transaction is left untouched.
    async fn release_listing_if_held(
        &self,
        id: ListingId,
        holder: TransactionId,
        to: ListingStatus,
    ) -> Result<bool, CoreError>;

    // -- offers --

    /// Insert a PENDING offer. Re-checks the one-live-offer-per-buyer
    /// invariant atomically; a violation is a ConflictError.
    async fn insert_offer(&self, offer: &Offer) -> Result<(), CoreError>;

    async fn get_offer(&self, id: OfferId) -> Result<Option<Offer>, CoreError>;

    /// The buyer's live (PENDING) offer on this listing, if any. Covers both
    /// directions of the chain: a seller counter awaiting the buyer still
    /// belongs to the buyer's chain.
    async fn find_live_offer(
        &self,
        listing_id: ListingId,
        buyer_id: UserId,
    ) -> Result<Option<Offer>, CoreError>;

    async fn update_offer_status_if(
        &self,
        id: OfferId,
        expected: OfferStatus,
        new: OfferStatus,
    ) -> Result<bool, CoreError>;

    async fn find_expired_pending_offers(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Offer>, CoreError>;

    async fn list_offers_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<Offer>, CoreError>;

    /// Offers created by this buyer since `since` (fraud velocity signal).
    async fn count_recent_offers(
        &self,
        buyer_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, CoreError>;

    // -- transactions --

    /// Insert a PENDING transaction. Re-checks the one-open-transaction-
    /// per-listing invariant atomically.
    async fn insert_transaction(&self, txn: &Transaction) -> Result<(), CoreError>;

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, CoreError>;

    async fn find_open_transaction_for_listing(
        &self,
        listing_id: ListingId,
    ) -> Result<Option<Transaction>, CoreError>;

    async fn update_transaction_status_if(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        new: TransactionStatus,
    ) -> Result<bool, CoreError>;

    /// CAS `expected -> TRANSFERRING`, recording the confirmation deadline
    /// in the same write.
    async fn begin_transfer_if(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        deadline: DateTime<Utc>,
    ) -> Result<bool, CoreError>;

    /// Admin override: force `target` (REFUNDED or CANCELLED) from any
    /// non-terminal state, stamping the acting admin. Returns false when the
    /// transaction reached a terminal state first.
    async fn force_terminal_if_open(
        &self,
        id: TransactionId,
        target: TransactionStatus,
        admin_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool, CoreError>;

    async fn find_expired_awaiting_payment(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Transaction>, CoreError>;

    async fn find_overdue_transferring(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Transaction>, CoreError>;

    /// Transactions opened by this buyer since `since` (fraud velocity
    /// signal).
    async fn count_recent_transactions(
        &self,
        buyer_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, CoreError>;

    // -- payments --

    async fn insert_payment(&self, payment: &Payment) -> Result<(), CoreError>;

    async fn get_payment_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<Payment>, CoreError>;

    async fn update_payment_status(
        &self,
        transaction_id: TransactionId,
        status: PaymentStatus,
    ) -> Result<(), CoreError>;

    async fn insert_payment_adjustment(
        &self,
        adjustment: &PaymentAdjustment,
    ) -> Result<(), CoreError>;

    // -- disputes --

    async fn insert_dispute(&self, dispute: &Dispute) -> Result<(), CoreError>;

    async fn get_dispute(&self, id: DisputeId) -> Result<Option<Dispute>, CoreError>;

    /// CAS: close the dispute with a ruling if it is still open, returning
    /// the updated record. None when it was already resolved.
    async fn resolve_dispute_if_open(
        &self,
        id: DisputeId,
        resolution: Resolution,
        resolved_by: UserId,
        notes: Option<String>,
    ) -> Result<Option<Dispute>, CoreError>;

    // -- webhook idempotency --

    async fn webhook_event_seen(&self, event_id: &str) -> Result<bool, CoreError>;

    async fn record_webhook_event(&self, event_id: &str) -> Result<(), CoreError>;

    // -- user profiles --

    async fn get_user_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, CoreError>;

    async fn upsert_user_profile(&self, profile: &UserProfile) -> Result<(), CoreError>;

    // -- partner API keys --

    async fn get_api_key(&self, key: &str) -> Result<Option<ApiKeyRecord>, CoreError>;

    async fn insert_api_key(&self, record: &ApiKeyRecord) -> Result<(), CoreError>;

    // -- aggregates --

    async fn marketplace_stats(&self) -> Result<MarketStats, CoreError>;
}
