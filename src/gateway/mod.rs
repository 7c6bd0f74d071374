//! HTTP gateway.
//!
//! Route map:
//! - `GET  /health`
//! - `POST /api/listings`, `GET /api/listings/{id}` (session)
//! - `POST /api/offers`, `GET /api/offers`, `GET /api/offers/{id}`,
//!   `POST /api/offers/{id}/respond` (session)
//! - `GET  /api/transactions/{id}`, `POST .../transfer`, `POST .../confirm`,
//!   `POST .../dispute` (session)
//! - `POST /api/admin/refund`, `POST /api/admin/cancel`,
//!   `POST /api/admin/review/{id}/release|cancel`,
//!   `POST /api/admin/disputes/{id}/resolve` (session, admin/mediator)
//! - `POST /api/webhooks/payment` (provider signature)
//! - `GET  /api/v1/listings|categories|stats` (partner API key)

pub mod handlers;
pub mod state;
pub mod types;

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::api_auth::{ApiAuthState, RateLimiter, api_auth_middleware, scopes};
use handlers::{admin, health, listings, offers, partner, transactions, webhook};
use state::AppState;

/// Build the full application router.
pub fn build_router(app_state: AppState, limiter: Arc<RateLimiter>) -> Router {
    let partner_auth = ApiAuthState {
        store: app_state.store.clone(),
        limiter,
        required_scope: scopes::READ,
    };

    let partner_routes = Router::new()
        .route("/api/v1/listings", get(partner::list_listings))
        .route("/api/v1/categories", get(partner::list_categories))
        .route("/api/v1/stats", get(partner::stats))
        .layer(from_fn_with_state(partner_auth, api_auth_middleware));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/listings", post(listings::create_listing))
        .route("/api/listings/{id}", get(listings::get_listing))
        .route("/api/offers", post(offers::create_offer).get(offers::list_my_offers))
        .route("/api/offers/{id}", get(offers::get_offer))
        .route("/api/offers/{id}/respond", post(offers::respond))
        .route("/api/transactions/{id}", get(transactions::get_transaction))
        .route(
            "/api/transactions/{id}/transfer",
            post(transactions::start_transfer),
        )
        .route(
            "/api/transactions/{id}/confirm",
            post(transactions::confirm_completion),
        )
        .route(
            "/api/transactions/{id}/dispute",
            post(transactions::raise_dispute),
        )
        .route("/api/admin/refund", post(admin::force_refund))
        .route("/api/admin/cancel", post(admin::force_cancel))
        .route("/api/admin/review/{id}/release", post(admin::release_review))
        .route("/api/admin/review/{id}/cancel", post(admin::cancel_review))
        .route(
            "/api/admin/disputes/{id}/resolve",
            post(admin::resolve_dispute),
        )
        .route("/api/webhooks/payment", post(webhook::payment_webhook))
        .merge(partner_routes)
        .with_state(app_state)
}

/// Bind and serve until shutdown.
pub async fn serve(router: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Gateway listening");
    axum::serve(listener, router).await?;
    Ok(())
}
