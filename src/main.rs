//! SeatSwap service entry point.
//!
//! Wires the store (Postgres when configured, in-memory otherwise), the
//! payment gateway (HTTP provider when configured, mock otherwise), the
//! state machines, the background sweeper, and the axum gateway.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use rust_decimal::Decimal;

use seatswap::admin::AdminOverrideGateway;
use seatswap::api_auth::{RateLimiter, RateLimiterConfig};
use seatswap::config::AppConfig;
use seatswap::dispute::{DisputePolicy, DisputeResolutionWorkflow};
use seatswap::escrow::{EscrowConfig, EscrowSweeper, EscrowTransactionMachine, SweeperConfig};
use seatswap::gateway::state::AppState;
use seatswap::logging::init_logging;
use seatswap::offer::{NegotiationConfig, OfferNegotiationMachine};
use seatswap::payment::{HttpPaymentGateway, MockGateway, PaymentGateway};
use seatswap::store::{MarketStore, MemoryStore, PgStore};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env);
    let _log_guard = init_logging(&config);

    tracing::info!("Starting SeatSwap decision core in {} mode", env);

    let store: Arc<dyn MarketStore> = match &config.postgres_url {
        Some(url) => {
            let pg = PgStore::connect(url).await?;
            pg.migrate().await?;
            tracing::info!("Using PostgreSQL store");
            Arc::new(pg)
        }
        None => {
            tracing::warn!("No postgres_url configured; using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let payment_gateway: Arc<dyn PaymentGateway> = match &config.payment_provider_url {
        Some(url) => Arc::new(HttpPaymentGateway::new(url.clone())),
        None => {
            tracing::warn!("No payment_provider_url configured; using mock gateway");
            Arc::new(MockGateway::new())
        }
    };

    let escrow_config = EscrowConfig {
        payment_deadline: Duration::seconds(config.escrow.payment_deadline_secs),
        transfer_deadline: Duration::seconds(config.escrow.transfer_deadline_secs),
        fee_pct: Decimal::from(config.escrow.fee_pct),
    };
    let negotiation_config = NegotiationConfig {
        offer_ttl: Duration::seconds(config.escrow.offer_ttl_secs),
    };
    let dispute_policy = DisputePolicy {
        partial_buyer_refund_pct: Decimal::from(config.escrow.partial_buyer_refund_pct),
    };

    let offers = Arc::new(OfferNegotiationMachine::new(
        store.clone(),
        negotiation_config,
    ));
    let escrow = Arc::new(EscrowTransactionMachine::new(
        store.clone(),
        payment_gateway.clone(),
        escrow_config,
    ));
    let disputes = Arc::new(DisputeResolutionWorkflow::new(
        store.clone(),
        payment_gateway.clone(),
        dispute_policy,
    ));
    let admin = Arc::new(AdminOverrideGateway::new(
        store.clone(),
        payment_gateway.clone(),
    ));

    let sweeper = EscrowSweeper::new(
        escrow.clone(),
        offers.clone(),
        SweeperConfig {
            interval: StdDuration::from_secs(config.escrow.sweep_interval_secs),
            ..Default::default()
        },
    );
    tokio::spawn(sweeper.run());

    let webhook_public_key = match &config.webhook.provider_public_key_hex {
        Some(hex_key) => Some(hex::decode(hex_key)?),
        None => {
            tracing::warn!("Webhook signature verification disabled");
            None
        }
    };

    let limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
        window: StdDuration::from_secs(config.rate_limit.window_secs),
        max_requests: config.rate_limit.max_requests,
    }));

    let app_state = AppState {
        store,
        offers,
        escrow,
        disputes,
        admin,
        webhook_public_key,
    };
    let router = seatswap::gateway::build_router(app_state, limiter);

    let port = get_port_override().unwrap_or(config.gateway.port);
    seatswap::gateway::serve(router, &config.gateway.host, port).await
}
