//! HTTP payment provider adapter.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ChargeRef, PaymentGateway};
use crate::error::CoreError;
use crate::escrow::Transaction;

/// reqwest-based adapter for the external payment provider.
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct ChargeRequest<'a> {
    reference: String,
    payer: u64,
    payee: u64,
    amount: Decimal,
    description: &'a str,
}

#[derive(Deserialize)]
struct ChargeResponse {
    charge_id: String,
}

#[derive(Serialize)]
struct RefundRequest {
    reference: String,
    amount: Decimal,
}

impl HttpPaymentGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_charge(&self, txn: &Transaction) -> Result<ChargeRef, CoreError> {
        let url = format!("{}/v1/charges", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&ChargeRequest {
                reference: txn.id.to_string(),
                payer: txn.buyer_id,
                payee: txn.seller_id,
                amount: txn.amount,
                description: &txn.code,
            })
            .send()
            .await
            .map_err(|e| CoreError::provider(format!("charge request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CoreError::provider(format!(
                "charge rejected with status {}",
                response.status()
            )));
        }
        let body: ChargeResponse = response
            .json()
            .await
            .map_err(|e| CoreError::provider(format!("bad charge response: {e}")))?;

        info!(txn = %txn.code, charge_id = %body.charge_id, "Charge registered");
        Ok(ChargeRef {
            provider_ref: body.charge_id,
        })
    }

    async fn refund(&self, txn: &Transaction, amount: Decimal) -> Result<(), CoreError> {
        let url = format!("{}/v1/refunds", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&RefundRequest {
                reference: txn.id.to_string(),
                amount,
            })
            .send()
            .await
            .map_err(|e| CoreError::provider(format!("refund request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(CoreError::provider(format!(
                "refund rejected with status {}",
                response.status()
            )));
        }
        info!(txn = %txn.code, %amount, "Refund issued");
        Ok(())
    }
}
