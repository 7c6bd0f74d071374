//! Dispute records and the resolution workflow.
//!
//! A dispute freezes its transaction in DISPUTED; resolution is the only way
//! out, and it is an admin/mediator action. The transaction transition lands
//! first, the dispute record is closed second: a crash in between leaves an
//! open dispute over a settled transaction, which resolves as a no-op
//! conflict on retry rather than a double settlement.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core_types::{DisputeId, Role, TransactionId, UserId};
use crate::error::CoreError;
use crate::escrow::{
    AdjustmentKind, PaymentAdjustment, PaymentStatus, Transaction, TransactionStatus,
};
use crate::listing::ListingStatus;
use crate::payment::PaymentGateway;
use crate::store::MarketStore;

/// Dispute lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum DisputeStatus {
    Open = 0,
    UnderReview = 10,
    Resolved = 20,
}

impl DisputeStatus {
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(DisputeStatus::Open),
            10 => Some(DisputeStatus::UnderReview),
            20 => Some(DisputeStatus::Resolved),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Open => "OPEN",
            DisputeStatus::UnderReview => "UNDER_REVIEW",
            DisputeStatus::Resolved => "RESOLVED",
        }
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a dispute settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resolution {
    /// Full refund to the buyer; transaction ends REFUNDED.
    Refund,
    /// Funds release to the seller; transaction ends COMPLETED.
    Release,
    /// Split settlement per policy; transaction ends COMPLETED with
    /// adjustment records for both legs.
    Partial,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Refund => "REFUND",
            Resolution::Release => "RELEASE",
            Resolution::Partial => "PARTIAL",
        }
    }
}

/// A contested transaction awaiting a ruling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub id: DisputeId,
    pub transaction_id: TransactionId,
    pub raised_by: UserId,
    pub reason: String,
    pub status: DisputeStatus,
    pub resolution: Option<Resolution>,
    pub resolved_by: Option<UserId>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Settlement policy knobs.
#[derive(Debug, Clone)]
pub struct DisputePolicy {
    /// PARTIAL resolution: percentage of the gross amount refunded to the
    /// buyer; the remainder (minus the platform fee) pays out to the seller.
    pub partial_buyer_refund_pct: Decimal,
}

impl Default for DisputePolicy {
    fn default() -> Self {
        Self {
            partial_buyer_refund_pct: Decimal::from(50),
        }
    }
}

pub struct DisputeResolutionWorkflow {
    store: Arc<dyn MarketStore>,
    gateway: Arc<dyn PaymentGateway>,
    policy: DisputePolicy,
}

impl DisputeResolutionWorkflow {
    pub fn new(
        store: Arc<dyn MarketStore>,
        gateway: Arc<dyn PaymentGateway>,
        policy: DisputePolicy,
    ) -> Self {
        Self {
            store,
            gateway,
            policy,
        }
    }

    /// Rule on an open dispute.
    ///
    /// Requires mediator privilege or better. The refund leg runs against
    /// the provider BEFORE the state transition: a provider failure leaves
    /// the dispute open and retryable.
    pub async fn resolve(
        &self,
        dispute_id: DisputeId,
        actor_id: UserId,
        actor_role: Role,
        resolution: Resolution,
        notes: Option<String>,
    ) -> Result<Dispute, CoreError> {
        if !actor_role.can_resolve_disputes() {
            return Err(CoreError::authorization(
                "dispute resolution requires mediator privilege",
            ));
        }

        let dispute = self
            .store
            .get_dispute(dispute_id)
            .await?
            .ok_or_else(|| CoreError::not_found("dispute"))?;
        if dispute.status == DisputeStatus::Resolved {
            return Err(CoreError::conflict("dispute is already resolved"));
        }

        let txn = self
            .store
            .get_transaction(dispute.transaction_id)
            .await?
            .ok_or_else(|| CoreError::not_found("transaction"))?;
        if txn.status != TransactionStatus::Disputed {
            return Err(CoreError::conflict(format!(
                "transaction is not disputed (status {})",
                txn.status
            )));
        }

        match resolution {
            Resolution::Refund => self.apply_refund(&txn).await?,
            Resolution::Release => self.apply_release(&txn).await?,
            Resolution::Partial => self.apply_partial(&txn).await?,
        }

        let resolved = self
            .store
            .resolve_dispute_if_open(dispute.id, resolution, actor_id, notes)
            .await?
            .ok_or_else(|| CoreError::conflict("dispute was resolved concurrently"))?;

        info!(
            dispute_id = %dispute.id,
            txn = %txn.code,
            resolution = resolution.as_str(),
            resolved_by = actor_id,
            "Dispute resolved"
        );
        Ok(resolved)
    }

    async fn apply_refund(&self, txn: &Transaction) -> Result<(), CoreError> {
        self.gateway.refund(txn, txn.amount).await?;
        if !self
            .store
            .update_transaction_status_if(
                txn.id,
                TransactionStatus::Disputed,
                TransactionStatus::Refunded,
            )
            .await?
        {
            // Refund already sent; surface loudly, do not retry the charge.
            warn!(txn = %txn.code, "Refund sent but transaction left DISPUTED concurrently");
            return Err(CoreError::conflict("transaction state changed concurrently"));
        }
        self.store
            .update_payment_status(txn.id, PaymentStatus::Failed)
            .await?;
        self.release_listing(txn, ListingStatus::Active).await;
        Ok(())
    }

    async fn apply_release(&self, txn: &Transaction) -> Result<(), CoreError> {
        if !self
            .store
            .update_transaction_status_if(
                txn.id,
                TransactionStatus::Disputed,
                TransactionStatus::Completed,
            )
            .await?
        {
            return Err(CoreError::conflict("transaction state changed concurrently"));
        }
        self.release_listing(txn, ListingStatus::Sold).await;
        Ok(())
    }

    /// Split settlement: buyer gets the policy percentage back, the seller
    /// is paid the remainder minus the platform fee, and both legs are
    /// recorded as adjustments against the payment.
    async fn apply_partial(&self, txn: &Transaction) -> Result<(), CoreError> {
        let payment = self
            .store
            .get_payment_for_transaction(txn.id)
            .await?
            .ok_or_else(|| CoreError::not_found("payment"))?;

        let buyer_amount =
            (txn.amount * self.policy.partial_buyer_refund_pct / Decimal::from(100)).round_dp(2);
        let seller_amount = (txn.amount - buyer_amount - txn.fee).max(Decimal::ZERO);

        self.gateway.refund(txn, buyer_amount).await?;

        if !self
            .store
            .update_transaction_status_if(
                txn.id,
                TransactionStatus::Disputed,
                TransactionStatus::Completed,
            )
            .await?
        {
            warn!(txn = %txn.code, "Partial refund sent but transaction left DISPUTED concurrently");
            return Err(CoreError::conflict("transaction state changed concurrently"));
        }

        let now = Utc::now();
        self.store
            .insert_payment_adjustment(&PaymentAdjustment {
                payment_id: payment.id,
                transaction_id: txn.id,
                beneficiary: txn.buyer_id,
                amount: buyer_amount,
                kind: AdjustmentKind::BuyerRefund,
                created_at: now,
            })
            .await?;
        self.store
            .insert_payment_adjustment(&PaymentAdjustment {
                payment_id: payment.id,
                transaction_id: txn.id,
                beneficiary: txn.seller_id,
                amount: seller_amount,
                kind: AdjustmentKind::SellerPayout,
                created_at: now,
            })
            .await?;

        // Reservation was consumed even though the buyer got money back.
        self.release_listing(txn, ListingStatus::Sold).await;
        Ok(())
    }

    async fn release_listing(&self, txn: &Transaction, to: ListingStatus) {
        if let Err(e) = self
            .store
            .release_listing_if_held(txn.listing_id, txn.id, to)
            .await
        {
            warn!(txn = %txn.code, listing_id = %txn.listing_id, error = %e,
                "Listing release failed during dispute resolution");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_id_roundtrip() {
        for s in [
            DisputeStatus::Open,
            DisputeStatus::UnderReview,
            DisputeStatus::Resolved,
        ] {
            assert_eq!(DisputeStatus::from_id(s.id()), Some(s));
        }
        assert_eq!(DisputeStatus::from_id(3), None);
    }

    #[test]
    fn test_default_partial_split_is_half() {
        let policy = DisputePolicy::default();
        assert_eq!(policy.partial_buyer_refund_pct, Decimal::from(50));
    }
}
