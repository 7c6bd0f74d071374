//! Transaction and payment record types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::state::TransactionStatus;
use crate::core_types::{ListingId, OfferId, PaymentId, TransactionId, UserId};
use crate::fraud::RiskLevel;
use crate::offer::OfferAccepted;

/// A single buyer-seller money-and-transfer flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    /// Short human-facing code (support tickets, receipts).
    pub code: String,
    pub listing_id: ListingId,
    pub offer_id: OfferId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    /// Gross escrowed amount (the accepted offer amount).
    pub amount: Decimal,
    /// Platform fee withheld from the seller payout.
    pub fee: Decimal,
    pub status: TransactionStatus,
    pub fraud_score: f64,
    pub fraud_level: RiskLevel,
    /// REVIEW recommendation: proceeds, but flagged for manual audit.
    pub flagged_for_review: bool,
    /// AWAITING_PAYMENT expiry; unpaid transactions are cancelled past it.
    pub payment_deadline: DateTime<Utc>,
    /// TRANSFERRING auto-complete deadline.
    pub transfer_deadline: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    /// Admin who forced the refund, when one did.
    pub refunded_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Build a PENDING transaction from an accepted offer.
    pub fn from_offer(
        event: &OfferAccepted,
        fee: Decimal,
        payment_deadline: DateTime<Utc>,
    ) -> Self {
        let id = TransactionId::new();
        let now = Utc::now();
        Self {
            id,
            code: id.code(),
            listing_id: event.listing_id,
            offer_id: event.offer_id,
            buyer_id: event.buyer_id,
            seller_id: event.seller_id,
            amount: event.amount,
            fee,
            status: TransactionStatus::Pending,
            fraud_score: 0.0,
            fraud_level: RiskLevel::Low,
            flagged_for_review: false,
            payment_deadline,
            transfer_deadline: None,
            refunded_at: None,
            refunded_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Seller payout after the platform fee.
    pub fn net_amount(&self) -> Decimal {
        self.amount - self.fee
    }
}

impl std::fmt::Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Transaction[{}] listing={} buyer={} seller={} amount={} status={}",
            self.code, self.listing_id, self.buyer_id, self.seller_id, self.amount, self.status
        )
    }
}

/// Payment settlement states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum PaymentStatus {
    Pending = 0,
    Processing = 10,
    Succeeded = 20,
    Failed = -10,
}

impl PaymentStatus {
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(PaymentStatus::Pending),
            10 => Some(PaymentStatus::Processing),
            20 => Some(PaymentStatus::Succeeded),
            -10 => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Succeeded => "SUCCEEDED",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

/// A settlement record tied 1:1 to a transaction.
///
/// Exists only once the transaction enters AWAITING_PAYMENT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub transaction_id: TransactionId,
    pub payer_id: UserId,
    pub payee_id: UserId,
    pub gross_amount: Decimal,
    /// Always <= gross_amount (fee withheld).
    pub net_amount: Decimal,
    pub status: PaymentStatus,
    /// Provider-side charge reference, set when the charge is registered.
    pub charge_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Direction of a partial-settlement adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdjustmentKind {
    BuyerRefund,
    SellerPayout,
}

impl AdjustmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentKind::BuyerRefund => "BUYER_REFUND",
            AdjustmentKind::SellerPayout => "SELLER_PAYOUT",
        }
    }
}

/// One leg of a split settlement produced by a PARTIAL dispute resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAdjustment {
    pub payment_id: PaymentId,
    pub transaction_id: TransactionId,
    pub beneficiary: UserId,
    pub amount: Decimal,
    pub kind: AdjustmentKind,
    pub created_at: DateTime<Utc>,
}

/// What the provider reported for a charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventKind {
    Succeeded,
    Failed,
}

/// A payment-provider webhook event, post signature verification.
///
/// `event_id` is the provider's event identifier and serves as the
/// idempotency key: replays are detected and no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub event_id: String,
    pub transaction_id: TransactionId,
    pub kind: PaymentEventKind,
    pub gross_amount: Option<Decimal>,
}
