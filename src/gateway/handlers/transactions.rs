//! Transaction lifecycle handlers (buyer/seller actions).

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResponse, SessionUser};
use crate::core_types::TransactionId;
use crate::dispute::Dispute;
use crate::error::CoreError;
use crate::escrow::Transaction;

pub async fn get_transaction(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<TransactionId>,
) -> Result<Json<ApiResponse<Transaction>>, ApiError> {
    let txn = state.escrow.get_transaction(id).await?;
    if session.user_id != txn.buyer_id
        && session.user_id != txn.seller_id
        && !session.role.is_admin()
    {
        return Err(CoreError::authorization("not a party to this transaction").into());
    }
    Ok(ApiResponse::ok(txn))
}

/// Seller starts the reservation transfer.
pub async fn start_transfer(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<TransactionId>,
) -> Result<Json<ApiResponse<Transaction>>, ApiError> {
    let txn = state.escrow.start_transfer(id, session.user_id).await?;
    Ok(ApiResponse::new(txn, "transfer started"))
}

/// Buyer confirms receipt; funds release to the seller.
pub async fn confirm_completion(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<TransactionId>,
) -> Result<Json<ApiResponse<Transaction>>, ApiError> {
    let txn = state.escrow.confirm_completion(id, session.user_id).await?;
    Ok(ApiResponse::new(txn, "transaction completed"))
}

#[derive(Debug, Deserialize)]
pub struct DisputeRequest {
    pub reason: String,
}

/// Either party contests the transaction while funds are escrowed.
pub async fn raise_dispute(
    State(state): State<AppState>,
    session: SessionUser,
    Path(id): Path<TransactionId>,
    Json(req): Json<DisputeRequest>,
) -> Result<Json<ApiResponse<Dispute>>, ApiError> {
    let dispute = state
        .escrow
        .raise_dispute(id, session.user_id, req.reason)
        .await?;
    Ok(ApiResponse::new(dispute, "dispute raised"))
}
