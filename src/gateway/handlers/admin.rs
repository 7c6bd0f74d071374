//! Admin override and dispute resolution handlers.
//!
//! All routes here require an admin (or, for dispute resolution, mediator)
//! role in the session identity.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResponse, SessionUser};
use crate::admin::RefundReceipt;
use crate::core_types::{DisputeId, TransactionId};
use crate::dispute::{Dispute, Resolution};
use crate::escrow::Transaction;

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    pub transaction_id: TransactionId,
}

pub async fn force_refund(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<OverrideRequest>,
) -> Result<Json<ApiResponse<RefundReceipt>>, ApiError> {
    let receipt = state
        .admin
        .force_refund(req.transaction_id, session.user_id, session.role)
        .await?;
    Ok(ApiResponse::new(receipt, "transaction refunded"))
}

pub async fn force_cancel(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<OverrideRequest>,
) -> Result<Json<ApiResponse<RefundReceipt>>, ApiError> {
    let receipt = state
        .admin
        .force_cancel(req.transaction_id, session.user_id, session.role)
        .await?;
    Ok(ApiResponse::new(receipt, "transaction cancelled"))
}

/// Release an UNDER_REVIEW transaction back into the payment flow.
pub async fn release_review(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<TransactionId>,
) -> Result<Json<ApiResponse<Transaction>>, ApiError> {
    session.require_admin()?;
    let txn = state.escrow.release_from_review(id, session.user_id).await?;
    Ok(ApiResponse::new(txn, "review hold released"))
}

/// Cancel an UNDER_REVIEW transaction.
pub async fn cancel_review(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<TransactionId>,
) -> Result<Json<ApiResponse<Transaction>>, ApiError> {
    session.require_admin()?;
    let txn = state.escrow.cancel_from_review(id, session.user_id).await?;
    Ok(ApiResponse::new(txn, "blocked transaction cancelled"))
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub resolution: Resolution,
    pub notes: Option<String>,
}

pub async fn resolve_dispute(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<DisputeId>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<ApiResponse<Dispute>>, ApiError> {
    let dispute = state
        .disputes
        .resolve(id, session.user_id, session.role, req.resolution, req.notes)
        .await?;
    Ok(ApiResponse::new(dispute, "dispute resolved"))
}
