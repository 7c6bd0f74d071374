//! Payment provider webhook handler.
//!
//! The signature is verified over the RAW body bytes before any JSON
//! parsing. Replayed event ids return 200 with an `ignored` marker so the
//! provider stops retrying; out-of-order events conflict.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResponse};
use crate::core_types::TransactionId;
use crate::error::CoreError;
use crate::escrow::{PaymentEvent, PaymentEventKind, WebhookOutcome};
use crate::payment::verify_webhook_signature;

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub event_id: String,
    pub transaction_id: TransactionId,
    /// `succeeded` or `failed`.
    pub status: PaymentEventKind,
    pub amount: Option<rust_decimal::Decimal>,
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub event_id: String,
    /// True when the event id had already been processed.
    pub ignored: bool,
}

pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookAck>>, ApiError> {
    if let Some(public_key) = &state.webhook_public_key {
        let signature = headers
            .get("X-Provider-Signature")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| CoreError::authentication("missing X-Provider-Signature"))?;
        if !verify_webhook_signature(public_key, &body, signature) {
            warn!("Webhook signature verification failed");
            return Err(CoreError::authentication("invalid webhook signature").into());
        }
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| CoreError::validation(format!("malformed webhook payload: {e}")))?;

    let event = PaymentEvent {
        event_id: payload.event_id.clone(),
        transaction_id: payload.transaction_id,
        kind: payload.status,
        gross_amount: payload.amount,
    };
    let outcome = state.escrow.ingest_payment_event(&event).await?;

    Ok(ApiResponse::ok(WebhookAck {
        event_id: payload.event_id,
        ignored: outcome == WebhookOutcome::Replay,
    }))
}
