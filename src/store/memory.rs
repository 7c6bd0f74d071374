//! In-memory store.
//!
//! One mutex over the whole state: cross-entity invariant checks (one live
//! offer per buyer per listing, one open transaction per listing) and every
//! CAS happen under the same lock, which gives this backend the same
//! atomicity the Postgres backend gets from conditional UPDATEs. Used by
//! tests and local runs without a database.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::{MarketStats, MarketStore};
use crate::account::UserProfile;
use crate::api_auth::ApiKeyRecord;
use crate::core_types::{DisputeId, ListingId, OfferId, TransactionId, UserId};
use crate::dispute::{Dispute, DisputeStatus, Resolution};
use crate::error::CoreError;
use crate::escrow::{Payment, PaymentAdjustment, PaymentStatus, Transaction, TransactionStatus};
use crate::listing::{Listing, ListingStatus};
use crate::offer::{Offer, OfferStatus};

#[derive(Default)]
struct Inner {
    listings: HashMap<ListingId, Listing>,
    offers: HashMap<OfferId, Offer>,
    transactions: HashMap<TransactionId, Transaction>,
    payments: HashMap<TransactionId, Payment>,
    adjustments: Vec<PaymentAdjustment>,
    disputes: HashMap<DisputeId, Dispute>,
    webhook_events: HashSet<String>,
    profiles: HashMap<UserId, UserProfile>,
    api_keys: HashMap<String, ApiKeyRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, CoreError> {
        self.inner
            .lock()
            .map_err(|_| CoreError::store("memory store lock poisoned"))
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn insert_listing(&self, listing: &Listing) -> Result<(), CoreError> {
        let mut inner = self.lock()?;
        inner.listings.insert(listing.id, listing.clone());
        Ok(())
    }

    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>, CoreError> {
        Ok(self.lock()?.listings.get(&id).cloned())
    }

    async fn list_listings(
        &self,
        status: Option<ListingStatus>,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Listing>, CoreError> {
        let inner = self.lock()?;
        let mut out: Vec<Listing> = inner
            .listings
            .values()
            .filter(|l| status.is_none_or(|s| l.status == s))
            .filter(|l| category.is_none_or(|c| l.category == c))
            .cloned()
            .collect();
        out.sort_by_key(|l| std::cmp::Reverse(l.published_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn update_listing_status_if(
        &self,
        id: ListingId,
        expected: ListingStatus,
        new: ListingStatus,
        holder: Option<TransactionId>,
    ) -> Result<bool, CoreError> {
        let mut inner = self.lock()?;
        match inner.listings.get_mut(&id) {
            Some(l) if l.status == expected => {
                l.status = new;
                l.reserved_by = holder;
                l.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_listing_if_held(
        &self,
        id: ListingId,
        holder: TransactionId,
        to: ListingStatus,
    ) -> Result<bool, CoreError> {
        let mut inner = self.lock()?;
        match inner.listings.get_mut(&id) {
            Some(l) if l.status == ListingStatus::Reserved && l.reserved_by == Some(holder) => {
                l.status = to;
                if to == ListingStatus::Active {
                    l.reserved_by = None;
                }
                l.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_offer(&self, offer: &Offer) -> Result<(), CoreError> {
        let mut inner = self.lock()?;
        let clash = inner.offers.values().any(|o| {
            o.listing_id == offer.listing_id
                && o.buyer_id == offer.buyer_id
                && o.status.is_live()
                && o.id != offer.id
        });
        if clash {
            return Err(CoreError::conflict(
                "buyer already has a live offer on this listing",
            ));
        }
        inner.offers.insert(offer.id, offer.clone());
        Ok(())
    }

    async fn get_offer(&self, id: OfferId) -> Result<Option<Offer>, CoreError> {
        Ok(self.lock()?.offers.get(&id).cloned())
    }

    async fn find_live_offer(
        &self,
        listing_id: ListingId,
        buyer_id: UserId,
    ) -> Result<Option<Offer>, CoreError> {
        let inner = self.lock()?;
        Ok(inner
            .offers
            .values()
            .find(|o| o.listing_id == listing_id && o.buyer_id == buyer_id && o.status.is_live())
            .cloned())
    }

    async fn update_offer_status_if(
        &self,
        id: OfferId,
        expected: OfferStatus,
        new: OfferStatus,
    ) -> Result<bool, CoreError> {
        let mut inner = self.lock()?;
        match inner.offers.get_mut(&id) {
            Some(o) if o.status == expected => {
                o.status = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_expired_pending_offers(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Offer>, CoreError> {
        let inner = self.lock()?;
        Ok(inner
            .offers
            .values()
            .filter(|o| o.status == OfferStatus::Pending && o.expires_at <= now)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_offers_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<Offer>, CoreError> {
        let inner = self.lock()?;
        let mut out: Vec<Offer> = inner
            .offers
            .values()
            .filter(|o| o.buyer_id == user_id || o.seller_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|o| std::cmp::Reverse(o.created_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn count_recent_offers(
        &self,
        buyer_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, CoreError> {
        let inner = self.lock()?;
        Ok(inner
            .offers
            .values()
            .filter(|o| o.buyer_id == buyer_id && o.created_at >= since)
            .count() as u32)
    }

    async fn insert_transaction(&self, txn: &Transaction) -> Result<(), CoreError> {
        let mut inner = self.lock()?;
        let clash = inner.transactions.values().any(|t| {
            t.listing_id == txn.listing_id && !t.status.is_terminal() && t.id != txn.id
        });
        if clash {
            return Err(CoreError::conflict(
                "listing already has an open transaction",
            ));
        }
        inner.transactions.insert(txn.id, txn.clone());
        Ok(())
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, CoreError> {
        Ok(self.lock()?.transactions.get(&id).cloned())
    }

    async fn find_open_transaction_for_listing(
        &self,
        listing_id: ListingId,
    ) -> Result<Option<Transaction>, CoreError> {
        let inner = self.lock()?;
        Ok(inner
            .transactions
            .values()
            .find(|t| t.listing_id == listing_id && !t.status.is_terminal())
            .cloned())
    }

    async fn update_transaction_status_if(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        new: TransactionStatus,
    ) -> Result<bool, CoreError> {
        let mut inner = self.lock()?;
        match inner.transactions.get_mut(&id) {
            Some(t) if t.status == expected => {
                t.status = new;
                t.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn begin_transfer_if(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        deadline: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let mut inner = self.lock()?;
        match inner.transactions.get_mut(&id) {
            Some(t) if t.status == expected => {
                t.status = TransactionStatus::Transferring;
                t.transfer_deadline = Some(deadline);
                t.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn force_terminal_if_open(
        &self,
        id: TransactionId,
        target: TransactionStatus,
        admin_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let mut inner = self.lock()?;
        match inner.transactions.get_mut(&id) {
            Some(t) if !t.status.is_terminal() => {
                t.status = target;
                t.refunded_at = Some(at);
                t.refunded_by = Some(admin_id);
                t.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_expired_awaiting_payment(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Transaction>, CoreError> {
        let inner = self.lock()?;
        Ok(inner
            .transactions
            .values()
            .filter(|t| t.status == TransactionStatus::AwaitingPayment && t.payment_deadline <= now)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_overdue_transferring(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Transaction>, CoreError> {
        let inner = self.lock()?;
        Ok(inner
            .transactions
            .values()
            .filter(|t| {
                t.status == TransactionStatus::Transferring
                    && t.transfer_deadline.is_some_and(|d| d <= now)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_recent_transactions(
        &self,
        buyer_id: UserId,
        since: DateTime<Utc>,
    ) -> Result<u32, CoreError> {
        let inner = self.lock()?;
        Ok(inner
            .transactions
            .values()
            .filter(|t| t.buyer_id == buyer_id && t.created_at >= since)
            .count() as u32)
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), CoreError> {
        let mut inner = self.lock()?;
        inner.payments.insert(payment.transaction_id, payment.clone());
        Ok(())
    }

    async fn get_payment_for_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<Payment>, CoreError> {
        Ok(self.lock()?.payments.get(&transaction_id).cloned())
    }

    async fn update_payment_status(
        &self,
        transaction_id: TransactionId,
        status: PaymentStatus,
    ) -> Result<(), CoreError> {
        let mut inner = self.lock()?;
        if let Some(p) = inner.payments.get_mut(&transaction_id) {
            p.status = status;
            p.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn insert_payment_adjustment(
        &self,
        adjustment: &PaymentAdjustment,
    ) -> Result<(), CoreError> {
        self.lock()?.adjustments.push(adjustment.clone());
        Ok(())
    }

    async fn insert_dispute(&self, dispute: &Dispute) -> Result<(), CoreError> {
        let mut inner = self.lock()?;
        inner.disputes.insert(dispute.id, dispute.clone());
        Ok(())
    }

    async fn get_dispute(&self, id: DisputeId) -> Result<Option<Dispute>, CoreError> {
        Ok(self.lock()?.disputes.get(&id).cloned())
    }

    async fn resolve_dispute_if_open(
        &self,
        id: DisputeId,
        resolution: Resolution,
        resolved_by: UserId,
        notes: Option<String>,
    ) -> Result<Option<Dispute>, CoreError> {
        let mut inner = self.lock()?;
        match inner.disputes.get_mut(&id) {
            Some(d) if d.status != DisputeStatus::Resolved => {
                d.status = DisputeStatus::Resolved;
                d.resolution = Some(resolution);
                d.resolved_by = Some(resolved_by);
                d.notes = notes;
                d.resolved_at = Some(Utc::now());
                Ok(Some(d.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn webhook_event_seen(&self, event_id: &str) -> Result<bool, CoreError> {
        Ok(self.lock()?.webhook_events.contains(event_id))
    }

    async fn record_webhook_event(&self, event_id: &str) -> Result<(), CoreError> {
        self.lock()?.webhook_events.insert(event_id.to_string());
        Ok(())
    }

    async fn get_user_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, CoreError> {
        Ok(self.lock()?.profiles.get(&user_id).cloned())
    }

    async fn upsert_user_profile(&self, profile: &UserProfile) -> Result<(), CoreError> {
        let mut inner = self.lock()?;
        inner.profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn get_api_key(&self, key: &str) -> Result<Option<ApiKeyRecord>, CoreError> {
        Ok(self.lock()?.api_keys.get(key).cloned())
    }

    async fn insert_api_key(&self, record: &ApiKeyRecord) -> Result<(), CoreError> {
        let mut inner = self.lock()?;
        inner.api_keys.insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn marketplace_stats(&self) -> Result<MarketStats, CoreError> {
        let inner = self.lock()?;
        let completed: Vec<&Transaction> = inner
            .transactions
            .values()
            .filter(|t| t.status == TransactionStatus::Completed)
            .collect();
        Ok(MarketStats {
            listings_total: inner.listings.len() as u64,
            listings_active: inner
                .listings
                .values()
                .filter(|l| l.status == ListingStatus::Active)
                .count() as u64,
            offers_total: inner.offers.len() as u64,
            transactions_total: inner.transactions.len() as u64,
            transactions_completed: completed.len() as u64,
            disputes_open: inner
                .disputes
                .values()
                .filter(|d| d.status != DisputeStatus::Resolved)
                .count() as u64,
            gross_volume: completed.iter().map(|t| t.amount).sum::<Decimal>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn listing() -> Listing {
        Listing::new(
            1,
            "show-a",
            "concerts",
            Decimal::from(100),
            Decimal::from(80),
            Utc::now() + Duration::days(30),
        )
    }

    fn offer(listing: &Listing, buyer: UserId) -> Offer {
        let now = Utc::now();
        Offer {
            id: OfferId::new(),
            listing_id: listing.id,
            buyer_id: buyer,
            seller_id: listing.seller_id,
            amount: Decimal::from(80),
            message: None,
            proposed_by: crate::offer::OfferParty::Buyer,
            status: OfferStatus::Pending,
            parent_offer_id: None,
            created_at: now,
            expires_at: now + Duration::hours(48),
        }
    }

    #[tokio::test]
    async fn test_listing_cas() {
        let store = MemoryStore::new();
        let l = listing();
        store.insert_listing(&l).await.unwrap();
        let holder = TransactionId::new();

        assert!(
            store
                .update_listing_status_if(l.id, ListingStatus::Active, ListingStatus::Reserved, Some(holder))
                .await
                .unwrap()
        );
        // Second reservation fails: no longer ACTIVE.
        assert!(
            !store
                .update_listing_status_if(l.id, ListingStatus::Active, ListingStatus::Reserved, None)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_release_requires_matching_holder() {
        let store = MemoryStore::new();
        let l = listing();
        store.insert_listing(&l).await.unwrap();
        let holder = TransactionId::new();
        store
            .update_listing_status_if(l.id, ListingStatus::Active, ListingStatus::Reserved, Some(holder))
            .await
            .unwrap();

        let stranger = TransactionId::new();
        assert!(
            !store
                .release_listing_if_held(l.id, stranger, ListingStatus::Active)
                .await
                .unwrap()
        );
        assert!(
            store
                .release_listing_if_held(l.id, holder, ListingStatus::Active)
                .await
                .unwrap()
        );
        let fetched = store.get_listing(l.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, ListingStatus::Active);
        assert!(fetched.reserved_by.is_none());
    }

    #[tokio::test]
    async fn test_second_live_offer_rejected() {
        let store = MemoryStore::new();
        let l = listing();
        store.insert_listing(&l).await.unwrap();

        store.insert_offer(&offer(&l, 42)).await.unwrap();
        let err = store.insert_offer(&offer(&l, 42)).await.unwrap_err();
        assert_eq!(err.code(), "CONFLICT");

        // A different buyer is fine.
        store.insert_offer(&offer(&l, 43)).await.unwrap();
    }

    #[tokio::test]
    async fn test_offer_cas_single_winner() {
        let store = MemoryStore::new();
        let l = listing();
        store.insert_listing(&l).await.unwrap();
        let o = offer(&l, 42);
        store.insert_offer(&o).await.unwrap();

        assert!(
            store
                .update_offer_status_if(o.id, OfferStatus::Pending, OfferStatus::Accepted)
                .await
                .unwrap()
        );
        assert!(
            !store
                .update_offer_status_if(o.id, OfferStatus::Pending, OfferStatus::Rejected)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_webhook_dedup() {
        let store = MemoryStore::new();
        assert!(!store.webhook_event_seen("evt_1").await.unwrap());
        store.record_webhook_event("evt_1").await.unwrap();
        assert!(store.webhook_event_seen("evt_1").await.unwrap());
        assert!(!store.webhook_event_seen("evt_2").await.unwrap());
    }
}
