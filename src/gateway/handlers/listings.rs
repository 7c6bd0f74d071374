//! Listing handlers (seller-facing).

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResponse, SessionUser};
use crate::core_types::ListingId;
use crate::error::CoreError;
use crate::listing::Listing;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateListingRequest {
    #[validate(length(min = 1, max = 128))]
    pub slug: String,
    #[validate(length(min = 1, max = 64))]
    pub category: String,
    pub original_price: Decimal,
    pub asking_price: Decimal,
    pub event_date: DateTime<Utc>,
}

pub async fn create_listing(
    State(state): State<AppState>,
    session: SessionUser,
    Json(req): Json<CreateListingRequest>,
) -> Result<Json<ApiResponse<Listing>>, ApiError> {
    req.validate()
        .map_err(|e| CoreError::validation(e.to_string()))?;
    if req.asking_price <= Decimal::ZERO {
        return Err(CoreError::validation("asking price must be greater than zero").into());
    }

    let listing = Listing::new(
        session.user_id,
        req.slug,
        req.category,
        req.original_price,
        req.asking_price,
        req.event_date,
    );
    state.store.insert_listing(&listing).await?;

    info!(listing_id = %listing.id, seller_id = session.user_id, "Listing created");
    Ok(ApiResponse::new(listing, "listing created"))
}

pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<ListingId>,
) -> Result<Json<ApiResponse<Listing>>, ApiError> {
    let listing = state
        .store
        .get_listing(id)
        .await?
        .ok_or_else(|| CoreError::not_found("listing"))?;
    Ok(ApiResponse::ok(listing))
}
