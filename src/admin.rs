//! Admin override: forced refund and forced cancel.
//!
//! Overrides are a separate transition kind from the normal trigger table:
//! any non-terminal transaction can be forced to REFUNDED or CANCELLED by an
//! admin. The money side only moves when the payment actually succeeded;
//! forcing an unpaid transaction just closes it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::core_types::{Role, TransactionId, UserId};
use crate::error::CoreError;
use crate::escrow::{PaymentStatus, Transaction, TransactionStatus};
use crate::listing::ListingStatus;
use crate::payment::PaymentGateway;
use crate::store::MarketStore;

/// Audit record returned from a forced override.
#[derive(Debug, Clone, Serialize)]
pub struct RefundReceipt {
    pub transaction_id: TransactionId,
    pub status: TransactionStatus,
    pub refunded_at: DateTime<Utc>,
    pub admin_id: UserId,
}

pub struct AdminOverrideGateway {
    store: Arc<dyn MarketStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl AdminOverrideGateway {
    pub fn new(store: Arc<dyn MarketStore>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    /// Force-refund a transaction regardless of its position in the normal
    /// flow. Idempotency: a second call on the same transaction is a
    /// CONFLICT, not a second refund.
    pub async fn force_refund(
        &self,
        transaction_id: TransactionId,
        admin_id: UserId,
        admin_role: Role,
    ) -> Result<RefundReceipt, CoreError> {
        self.force_terminal(transaction_id, admin_id, admin_role, TransactionStatus::Refunded)
            .await
    }

    /// Force-cancel a transaction. Funds held in escrow are returned to the
    /// buyer, same as a refund; the distinction is the recorded outcome.
    pub async fn force_cancel(
        &self,
        transaction_id: TransactionId,
        admin_id: UserId,
        admin_role: Role,
    ) -> Result<RefundReceipt, CoreError> {
        self.force_terminal(transaction_id, admin_id, admin_role, TransactionStatus::Cancelled)
            .await
    }

    async fn force_terminal(
        &self,
        transaction_id: TransactionId,
        admin_id: UserId,
        admin_role: Role,
        target: TransactionStatus,
    ) -> Result<RefundReceipt, CoreError> {
        if !admin_role.is_admin() {
            return Err(CoreError::authorization(
                "forced overrides require admin privilege",
            ));
        }

        let txn = self
            .store
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| CoreError::not_found("transaction"))?;

        if txn.status == TransactionStatus::Completed {
            return Err(CoreError::conflict("Transaction is already completed"));
        }
        if txn.status.is_terminal() {
            return Err(CoreError::conflict(
                "Transaction has already been refunded or cancelled",
            ));
        }

        // Money moves only if the provider actually collected it.
        let payment = self.store.get_payment_for_transaction(txn.id).await?;
        if let Some(p) = &payment
            && p.status == PaymentStatus::Succeeded
        {
            self.gateway.refund(&txn, txn.amount).await?;
        }

        let now = Utc::now();
        if !self
            .store
            .force_terminal_if_open(txn.id, target, admin_id, now)
            .await?
        {
            // Raced another override or a normal completion after the refund
            // call; surface it, operators reconcile against the provider.
            warn!(txn = %txn.code, target = %target, "Forced override lost the race");
            return Err(CoreError::conflict(
                "Transaction has already been refunded or cancelled",
            ));
        }

        if payment.is_some() {
            self.store
                .update_payment_status(txn.id, PaymentStatus::Failed)
                .await?;
        }
        self.release_listing(&txn).await;

        info!(
            txn = %txn.code,
            admin_id,
            from = %txn.status,
            to = %target,
            "Admin override applied"
        );
        Ok(RefundReceipt {
            transaction_id: txn.id,
            status: target,
            refunded_at: now,
            admin_id,
        })
    }

    /// Reactivate the listing if this transaction held it. One retry on a
    /// transient store failure; beyond that the sweeper reconciles.
    async fn release_listing(&self, txn: &Transaction) {
        for attempt in 0..2 {
            match self
                .store
                .release_listing_if_held(txn.listing_id, txn.id, ListingStatus::Active)
                .await
            {
                Ok(_) => return,
                Err(e) if attempt == 0 => {
                    warn!(txn = %txn.code, error = %e, "Listing release failed, retrying");
                }
                Err(e) => {
                    warn!(txn = %txn.code, error = %e, "Listing release failed after retry");
                }
            }
        }
    }
}
