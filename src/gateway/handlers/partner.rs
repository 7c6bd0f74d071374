//! Read-only partner API handlers (behind API-key auth).

use std::collections::BTreeSet;

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResponse};
use crate::listing::{Listing, ListingStatus};
use crate::store::MarketStats;

#[derive(Debug, Deserialize)]
pub struct ListingsQuery {
    pub category: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Active listings, newest first.
pub async fn list_listings(
    State(state): State<AppState>,
    Query(query): Query<ListingsQuery>,
) -> Result<Json<ApiResponse<Vec<Listing>>>, ApiError> {
    let limit = query.limit.min(200);
    let listings = state
        .store
        .list_listings(
            Some(ListingStatus::Active),
            query.category.as_deref(),
            limit,
        )
        .await?;
    Ok(ApiResponse::ok(listings))
}

/// Distinct categories with at least one active listing.
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    let listings = state
        .store
        .list_listings(Some(ListingStatus::Active), None, 1000)
        .await?;
    let categories: BTreeSet<String> = listings.into_iter().map(|l| l.category).collect();
    Ok(ApiResponse::ok(categories.into_iter().collect()))
}

pub async fn stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MarketStats>>, ApiError> {
    let stats = state.store.marketplace_stats().await?;
    Ok(ApiResponse::ok(stats))
}
