//! Payment provider port.
//!
//! The escrow machine never talks to a provider directly; it goes through
//! [`PaymentGateway`]. Production uses the HTTP adapter, tests and local
//! runs use [`MockGateway`].
//!
//! ## Components
//! - `http`: reqwest-based provider adapter
//! - `signature`: Ed25519 webhook signature verification

pub mod http;
pub mod signature;

pub use http::HttpPaymentGateway;
pub use signature::verify_webhook_signature;

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::CoreError;
use crate::escrow::Transaction;

/// Provider-side reference for a registered charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRef {
    pub provider_ref: String,
}

/// Outbound payment operations.
///
/// `refund` takes an explicit amount: full for REFUND resolutions and admin
/// overrides, partial for PARTIAL dispute splits.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register a charge for the transaction's gross amount.
    async fn create_charge(&self, txn: &Transaction) -> Result<ChargeRef, CoreError>;

    /// Return `amount` of the collected funds to the buyer.
    async fn refund(&self, txn: &Transaction, amount: Decimal) -> Result<(), CoreError>;
}

/// In-process gateway for tests and local runs without a provider.
///
/// Records refund calls so tests can assert exactly-once money movement.
#[derive(Default)]
pub struct MockGateway {
    fail_charges: AtomicBool,
    fail_refunds: AtomicBool,
    refund_count: AtomicUsize,
    refunds: Mutex<Vec<Decimal>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent create_charge calls fail with a provider error.
    pub fn set_fail_charges(&self, fail: bool) {
        self.fail_charges.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent refund calls fail with a provider error.
    pub fn set_fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    pub fn refund_count(&self) -> usize {
        self.refund_count.load(Ordering::SeqCst)
    }

    /// Amounts of every refund issued, in call order.
    pub fn refund_amounts(&self) -> Vec<Decimal> {
        self.refunds.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_charge(&self, txn: &Transaction) -> Result<ChargeRef, CoreError> {
        if self.fail_charges.load(Ordering::SeqCst) {
            return Err(CoreError::provider("charge rejected"));
        }
        Ok(ChargeRef {
            provider_ref: format!("ch_{}", txn.id),
        })
    }

    async fn refund(&self, _txn: &Transaction, amount: Decimal) -> Result<(), CoreError> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(CoreError::provider("refund rejected"));
        }
        self.refund_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut refunds) = self.refunds.lock() {
            refunds.push(amount);
        }
        Ok(())
    }
}
