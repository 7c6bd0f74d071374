//! Background deadline sweep.
//!
//! Deadlines are enforced lazily at the trigger points and periodically
//! here. The sweep is safe to run concurrently with live traffic: every
//! expiry is a CAS, so a transaction that moves on between the scan and the
//! write is simply skipped.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use super::machine::EscrowTransactionMachine;
use crate::offer::OfferNegotiationMachine;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    pub interval: Duration,
    /// Max rows handled per category per pass.
    pub batch_size: usize,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            batch_size: 200,
        }
    }
}

pub struct EscrowSweeper {
    escrow: Arc<EscrowTransactionMachine>,
    offers: Arc<OfferNegotiationMachine>,
    config: SweeperConfig,
}

impl EscrowSweeper {
    pub fn new(
        escrow: Arc<EscrowTransactionMachine>,
        offers: Arc<OfferNegotiationMachine>,
        config: SweeperConfig,
    ) -> Self {
        Self {
            escrow,
            offers,
            config,
        }
    }

    /// Run forever. Spawn on its own task.
    pub async fn run(self) {
        info!(interval = ?self.config.interval, "Sweeper started");
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }

    /// One full pass over every deadline category.
    pub async fn sweep_once(&self) {
        match self.offers.expire_due(self.config.batch_size).await {
            Ok(n) if n > 0 => info!(count = n, "Expired pending offers"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Offer expiry sweep failed"),
        }

        match self.escrow.expire_unpaid(self.config.batch_size).await {
            Ok(n) if n > 0 => info!(count = n, "Cancelled unpaid transactions"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Unpaid-transaction sweep failed"),
        }

        match self.escrow.auto_complete_overdue(self.config.batch_size).await {
            Ok(n) if n > 0 => info!(count = n, "Auto-completed overdue transfers"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "Transfer auto-complete sweep failed"),
        }
    }
}
