//! Escrow transition driver.
//!
//! Every state change goes through a store-level CAS (`update_..._if`): the
//! write succeeds only when the row is still in the expected state, so
//! concurrent triggers race and exactly one wins. The loser sees a
//! ConflictError, never a double-applied transition.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::state::TransactionStatus;
use super::types::{
    Payment, PaymentEvent, PaymentEventKind, PaymentStatus, Transaction,
};
use crate::core_types::{DisputeId, PaymentId, TransactionId, UserId};
use crate::dispute::{Dispute, DisputeStatus};
use crate::error::CoreError;
use crate::fraud::{self, FraudCheckParams, Recommendation};
use crate::listing::{Listing, ListingStatus};
use crate::offer::OfferAccepted;
use crate::payment::PaymentGateway;
use crate::store::MarketStore;

/// Escrow tunables.
#[derive(Debug, Clone)]
pub struct EscrowConfig {
    /// How long AWAITING_PAYMENT waits for the provider webhook.
    pub payment_deadline: Duration,
    /// How long TRANSFERRING waits for buyer confirmation before
    /// auto-completing.
    pub transfer_deadline: Duration,
    /// Platform fee, percent of the gross amount.
    pub fee_pct: Decimal,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            payment_deadline: Duration::hours(24),
            transfer_deadline: Duration::hours(72),
            fee_pct: Decimal::from(10),
        }
    }
}

/// Result of ingesting one provider webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event moved the transaction to this status.
    Applied(TransactionStatus),
    /// Event id already processed; nothing changed.
    Replay,
}

pub struct EscrowTransactionMachine {
    store: Arc<dyn MarketStore>,
    gateway: Arc<dyn PaymentGateway>,
    config: EscrowConfig,
}

impl EscrowTransactionMachine {
    pub fn new(
        store: Arc<dyn MarketStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: EscrowConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    /// Open a transaction from an accepted offer and run the fraud gate.
    ///
    /// ALLOW and REVIEW proceed to payment activation (REVIEW is flagged for
    /// manual audit); BLOCK parks the transaction in UNDER_REVIEW without
    /// touching the listing or the payment provider.
    pub async fn open_from_offer(&self, event: &OfferAccepted) -> Result<Transaction, CoreError> {
        if self
            .store
            .find_open_transaction_for_listing(event.listing_id)
            .await?
            .is_some()
        {
            return Err(CoreError::conflict(
                "listing already has an open transaction",
            ));
        }

        let listing = self
            .store
            .get_listing(event.listing_id)
            .await?
            .ok_or_else(|| CoreError::not_found("listing"))?;

        let check = fraud::score(&self.fraud_params(&listing, event.buyer_id).await?);

        let fee = (event.amount * self.config.fee_pct / Decimal::from(100)).round_dp(2);
        let mut txn =
            Transaction::from_offer(event, fee, Utc::now() + self.config.payment_deadline);
        txn.fraud_score = check.score;
        txn.fraud_level = check.level;
        txn.flagged_for_review = check.recommendation == Recommendation::Review;
        self.store.insert_transaction(&txn).await?;

        info!(
            txn = %txn.code,
            score = check.score,
            level = check.level.as_str(),
            recommendation = check.recommendation.as_str(),
            hard_blocked = check.hard_blocked,
            "Fraud gate evaluated"
        );

        match check.recommendation {
            Recommendation::Block => {
                if !self
                    .store
                    .update_transaction_status_if(
                        txn.id,
                        TransactionStatus::Pending,
                        TransactionStatus::UnderReview,
                    )
                    .await?
                {
                    return Err(CoreError::conflict("transaction state changed concurrently"));
                }
                txn.status = TransactionStatus::UnderReview;
                warn!(txn = %txn.code, "Transaction held for review");
                Ok(txn)
            }
            Recommendation::Allow | Recommendation::Review => self.activate_payment(txn).await,
        }
    }

    /// Reserve the listing, register the charge, and move to
    /// AWAITING_PAYMENT.
    ///
    /// The listing is reserved BEFORE the provider call so a second buyer
    /// cannot slip in while the charge is in flight; a provider failure rolls
    /// the reservation back.
    async fn activate_payment(&self, mut txn: Transaction) -> Result<Transaction, CoreError> {
        if !self
            .store
            .update_listing_status_if(
                txn.listing_id,
                ListingStatus::Active,
                ListingStatus::Reserved,
                Some(txn.id),
            )
            .await?
        {
            return Err(CoreError::conflict("listing is no longer active"));
        }

        let charge = match self.gateway.create_charge(&txn).await {
            Ok(c) => c,
            Err(e) => {
                self.release_listing(&txn, ListingStatus::Active).await;
                return Err(e);
            }
        };

        let now = Utc::now();
        let payment = Payment {
            id: PaymentId::new(),
            transaction_id: txn.id,
            payer_id: txn.buyer_id,
            payee_id: txn.seller_id,
            gross_amount: txn.amount,
            net_amount: txn.net_amount(),
            status: PaymentStatus::Pending,
            charge_ref: Some(charge.provider_ref),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_payment(&payment).await?;

        if !self
            .store
            .update_transaction_status_if(
                txn.id,
                TransactionStatus::Pending,
                TransactionStatus::AwaitingPayment,
            )
            .await?
        {
            self.release_listing(&txn, ListingStatus::Active).await;
            return Err(CoreError::conflict("transaction state changed concurrently"));
        }
        txn.status = TransactionStatus::AwaitingPayment;

        info!(txn = %txn.code, payment_id = %payment.id, "Awaiting payment");
        Ok(txn)
    }

    /// Admin action: release an UNDER_REVIEW transaction back into the flow.
    pub async fn release_from_review(
        &self,
        transaction_id: TransactionId,
        admin_id: UserId,
    ) -> Result<Transaction, CoreError> {
        let mut txn = self.get_transaction(transaction_id).await?;
        if !self
            .store
            .update_transaction_status_if(
                txn.id,
                TransactionStatus::UnderReview,
                TransactionStatus::Pending,
            )
            .await?
        {
            return Err(CoreError::conflict(format!(
                "transaction is not under review (status {})",
                txn.status
            )));
        }
        txn.status = TransactionStatus::Pending;
        info!(txn = %txn.code, admin_id, "Review hold released");
        self.activate_payment(txn).await
    }

    /// Admin action: cancel an UNDER_REVIEW transaction.
    ///
    /// Nothing to unwind: blocked transactions never reserved the listing or
    /// reached the provider.
    pub async fn cancel_from_review(
        &self,
        transaction_id: TransactionId,
        admin_id: UserId,
    ) -> Result<Transaction, CoreError> {
        let mut txn = self.get_transaction(transaction_id).await?;
        if !self
            .store
            .update_transaction_status_if(
                txn.id,
                TransactionStatus::UnderReview,
                TransactionStatus::Cancelled,
            )
            .await?
        {
            return Err(CoreError::conflict(format!(
                "transaction is not under review (status {})",
                txn.status
            )));
        }
        txn.status = TransactionStatus::Cancelled;
        info!(txn = %txn.code, admin_id, "Blocked transaction cancelled");
        Ok(txn)
    }

    /// Apply one verified provider webhook event.
    ///
    /// Idempotent on the provider event id: a replayed id is a no-op
    /// success. A NEW event id arriving when the transaction has already
    /// left AWAITING_PAYMENT is a conflict (out-of-order delivery).
    pub async fn ingest_payment_event(
        &self,
        event: &PaymentEvent,
    ) -> Result<WebhookOutcome, CoreError> {
        if self.store.webhook_event_seen(&event.event_id).await? {
            info!(event_id = %event.event_id, "Webhook replay ignored");
            return Ok(WebhookOutcome::Replay);
        }

        let txn = self.get_transaction(event.transaction_id).await?;

        let applied = match event.kind {
            PaymentEventKind::Succeeded => {
                if !self
                    .store
                    .update_transaction_status_if(
                        txn.id,
                        TransactionStatus::AwaitingPayment,
                        TransactionStatus::PaymentConfirmed,
                    )
                    .await?
                {
                    return Err(CoreError::conflict(format!(
                        "transaction is not awaiting payment (status {})",
                        txn.status
                    )));
                }
                self.store
                    .update_payment_status(txn.id, PaymentStatus::Succeeded)
                    .await?;
                info!(txn = %txn.code, event_id = %event.event_id, "Payment confirmed");
                TransactionStatus::PaymentConfirmed
            }
            PaymentEventKind::Failed => {
                if !self
                    .store
                    .update_transaction_status_if(
                        txn.id,
                        TransactionStatus::AwaitingPayment,
                        TransactionStatus::Cancelled,
                    )
                    .await?
                {
                    return Err(CoreError::conflict(format!(
                        "transaction is not awaiting payment (status {})",
                        txn.status
                    )));
                }
                self.store
                    .update_payment_status(txn.id, PaymentStatus::Failed)
                    .await?;
                self.release_listing(&txn, ListingStatus::Active).await;
                warn!(txn = %txn.code, event_id = %event.event_id, "Payment failed, cancelled");
                TransactionStatus::Cancelled
            }
        };

        // Recorded after the apply: a crash in between re-delivers the event,
        // and the CAS above rejects the duplicate apply.
        self.store.record_webhook_event(&event.event_id).await?;
        Ok(WebhookOutcome::Applied(applied))
    }

    /// Seller starts the reservation transfer.
    pub async fn start_transfer(
        &self,
        transaction_id: TransactionId,
        actor_id: UserId,
    ) -> Result<Transaction, CoreError> {
        let mut txn = self.get_transaction(transaction_id).await?;
        if actor_id != txn.seller_id {
            return Err(CoreError::authorization(
                "only the seller may start the transfer",
            ));
        }

        let deadline = Utc::now() + self.config.transfer_deadline;
        if !self
            .store
            .begin_transfer_if(txn.id, TransactionStatus::PaymentConfirmed, deadline)
            .await?
        {
            return Err(CoreError::conflict(format!(
                "transfer cannot start from status {}",
                txn.status
            )));
        }
        txn.status = TransactionStatus::Transferring;
        txn.transfer_deadline = Some(deadline);
        info!(txn = %txn.code, "Transfer started");
        Ok(txn)
    }

    /// Buyer confirms receipt; funds release to the seller and the listing
    /// is marked SOLD.
    pub async fn confirm_completion(
        &self,
        transaction_id: TransactionId,
        actor_id: UserId,
    ) -> Result<Transaction, CoreError> {
        let mut txn = self.get_transaction(transaction_id).await?;
        if actor_id != txn.buyer_id {
            return Err(CoreError::authorization(
                "only the buyer may confirm completion",
            ));
        }

        if !self
            .store
            .update_transaction_status_if(
                txn.id,
                TransactionStatus::Transferring,
                TransactionStatus::Completed,
            )
            .await?
        {
            return Err(CoreError::conflict(format!(
                "completion cannot be confirmed from status {}",
                txn.status
            )));
        }
        txn.status = TransactionStatus::Completed;
        self.release_listing(&txn, ListingStatus::Sold).await;
        info!(txn = %txn.code, "Transaction completed");
        Ok(txn)
    }

    /// Either party contests the transaction while funds are escrowed.
    pub async fn raise_dispute(
        &self,
        transaction_id: TransactionId,
        actor_id: UserId,
        reason: String,
    ) -> Result<Dispute, CoreError> {
        let txn = self.get_transaction(transaction_id).await?;
        if actor_id != txn.buyer_id && actor_id != txn.seller_id {
            return Err(CoreError::authorization(
                "only a transaction party may raise a dispute",
            ));
        }
        if reason.trim().is_empty() {
            return Err(CoreError::validation("dispute reason is required"));
        }

        // Two legal sources, tried in order; the first CAS that lands wins.
        let moved = self
            .store
            .update_transaction_status_if(
                txn.id,
                TransactionStatus::PaymentConfirmed,
                TransactionStatus::Disputed,
            )
            .await?
            || self
                .store
                .update_transaction_status_if(
                    txn.id,
                    TransactionStatus::Transferring,
                    TransactionStatus::Disputed,
                )
                .await?;
        if !moved {
            return Err(CoreError::conflict(format!(
                "transaction cannot be disputed from status {}",
                txn.status
            )));
        }

        let dispute = Dispute {
            id: DisputeId::new(),
            transaction_id: txn.id,
            raised_by: actor_id,
            reason,
            status: DisputeStatus::Open,
            resolution: None,
            resolved_by: None,
            notes: None,
            created_at: Utc::now(),
            resolved_at: None,
        };
        self.store.insert_dispute(&dispute).await?;

        warn!(txn = %txn.code, dispute_id = %dispute.id, raised_by = actor_id, "Dispute raised");
        Ok(dispute)
    }

    /// Cancel AWAITING_PAYMENT transactions past their deadline.
    /// Returns the number swept.
    pub async fn expire_unpaid(&self, limit: usize) -> Result<usize, CoreError> {
        let now = Utc::now();
        let due = self.store.find_expired_awaiting_payment(now, limit).await?;
        let mut swept = 0;
        for txn in due {
            if self
                .store
                .update_transaction_status_if(
                    txn.id,
                    TransactionStatus::AwaitingPayment,
                    TransactionStatus::Cancelled,
                )
                .await?
            {
                self.store
                    .update_payment_status(txn.id, PaymentStatus::Failed)
                    .await?;
                self.release_listing(&txn, ListingStatus::Active).await;
                info!(txn = %txn.code, "Unpaid transaction expired");
                swept += 1;
            }
        }
        Ok(swept)
    }

    /// Auto-complete TRANSFERRING transactions whose confirmation window
    /// lapsed without a dispute. Returns the number swept.
    pub async fn auto_complete_overdue(&self, limit: usize) -> Result<usize, CoreError> {
        let now = Utc::now();
        let due = self.store.find_overdue_transferring(now, limit).await?;
        let mut swept = 0;
        for txn in due {
            if self
                .store
                .update_transaction_status_if(
                    txn.id,
                    TransactionStatus::Transferring,
                    TransactionStatus::Completed,
                )
                .await?
            {
                self.release_listing(&txn, ListingStatus::Sold).await;
                info!(txn = %txn.code, "Transfer auto-completed after deadline");
                swept += 1;
            }
        }
        Ok(swept)
    }

    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, CoreError> {
        self.store
            .get_transaction(id)
            .await?
            .ok_or_else(|| CoreError::not_found("transaction"))
    }

    /// Release the reservation hold, but only if this transaction still owns
    /// it. Failure is logged, not surfaced: the transaction transition
    /// already committed and the sweeper picks up stragglers.
    async fn release_listing(&self, txn: &Transaction, to: ListingStatus) {
        match self.store.release_listing_if_held(txn.listing_id, txn.id, to).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(txn = %txn.code, listing_id = %txn.listing_id, to = %to,
                    "Listing hold was not ours to release");
            }
            Err(e) => {
                warn!(txn = %txn.code, listing_id = %txn.listing_id, error = %e,
                    "Listing release failed");
            }
        }
    }

    async fn fraud_params(
        &self,
        listing: &Listing,
        buyer_id: UserId,
    ) -> Result<FraudCheckParams, CoreError> {
        let now = Utc::now();
        let profile = self.store.get_user_profile(buyer_id).await?;
        let offers_last_hour = self
            .store
            .count_recent_offers(buyer_id, now - Duration::hours(1))
            .await?;
        let transactions_last_day = self
            .store
            .count_recent_transactions(buyer_id, now - Duration::hours(24))
            .await?;

        let mut params = FraudCheckParams {
            price_deviation_ratio: listing.price_deviation(),
            listing_age_hours: Some(listing.age_hours(now)),
            offers_last_hour: Some(offers_last_hour),
            transactions_last_day: Some(transactions_last_day),
            ..Default::default()
        };
        if let Some(p) = profile {
            params.account_age_days = Some(p.age_days(now));
            params.prior_completed_transactions = Some(p.completed_transactions);
            params.prior_disputes = Some(p.disputes);
            params.confirmed_fraud_disputes = Some(p.confirmed_fraud_disputes);
            params.email_verified = Some(p.email_verified);
            params.phone_verified = Some(p.phone_verified);
            params.kyc_verified = Some(p.kyc_verified);
            params.new_device = Some(p.new_device);
            params.geo_mismatch = Some(p.geo_mismatch);
        }
        Ok(params)
    }
}
