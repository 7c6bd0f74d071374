//! Offer negotiation handlers.

use axum::Json;
use axum::extract::{Path, State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResponse, SessionUser};
use crate::core_types::{ListingId, OfferId};
use crate::error::CoreError;
use crate::escrow::Transaction;
use crate::offer::{Offer, OfferAction, OfferOutcome};

#[derive(Debug, Deserialize)]
pub struct CreateOfferRequest {
    pub listing_id: ListingId,
    pub amount: Decimal,
    pub message: Option<String>,
}

pub async fn create_offer(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<CreateOfferRequest>,
) -> Result<Json<ApiResponse<Offer>>, ApiError> {
    let offer = state
        .offers
        .create_offer(req.listing_id, session.user_id, req.amount, req.message)
        .await?;
    Ok(ApiResponse::new(offer, "offer created"))
}

pub async fn list_my_offers(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<Json<ApiResponse<Vec<Offer>>>, ApiError> {
    let offers = state.store.list_offers_for_user(session.user_id, 100).await?;
    Ok(ApiResponse::ok(offers))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RespondAction {
    Accept,
    Reject,
    Counter,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub action: RespondAction,
    pub counter_amount: Option<Decimal>,
    pub counter_message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RespondResponse {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter_offer: Option<Offer>,
}

/// Respond to a live offer. Acceptance opens the escrow transaction in the
/// same request so the caller sees the fraud-gate outcome immediately.
pub async fn respond(
    State(state): State<AppState>,
    session: SessionUser,
    Path(offer_id): Path<OfferId>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<ApiResponse<RespondResponse>>, ApiError> {
    let action = match req.action {
        RespondAction::Accept => OfferAction::Accept,
        RespondAction::Reject => OfferAction::Reject,
        RespondAction::Counter => OfferAction::Counter,
    };

    let outcome = state
        .offers
        .respond(
            offer_id,
            session.user_id,
            action,
            req.counter_amount,
            req.counter_message,
        )
        .await?;

    let response = match outcome {
        OfferOutcome::Accepted(event) => {
            let txn = state.escrow.open_from_offer(&event).await?;
            RespondResponse {
                outcome: "ACCEPTED",
                transaction: Some(txn),
                counter_offer: None,
            }
        }
        OfferOutcome::Rejected => RespondResponse {
            outcome: "REJECTED",
            transaction: None,
            counter_offer: None,
        },
        OfferOutcome::Countered(counter) => RespondResponse {
            outcome: "COUNTERED",
            transaction: None,
            counter_offer: Some(counter),
        },
    };
    Ok(ApiResponse::ok(response))
}

pub async fn get_offer(
    State(state): State<AppState>,
    session: SessionUser,
    Path(offer_id): Path<OfferId>,
) -> Result<Json<ApiResponse<Offer>>, ApiError> {
    let offer = state
        .store
        .get_offer(offer_id)
        .await?
        .ok_or_else(|| CoreError::not_found("offer"))?;
    if session.user_id != offer.buyer_id
        && session.user_id != offer.seller_id
        && !session.role.is_admin()
    {
        return Err(CoreError::authorization("not a party to this offer").into());
    }
    Ok(ApiResponse::ok(offer))
}
