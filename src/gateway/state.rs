//! Shared gateway state.

use std::sync::Arc;

use crate::admin::AdminOverrideGateway;
use crate::dispute::DisputeResolutionWorkflow;
use crate::escrow::EscrowTransactionMachine;
use crate::offer::OfferNegotiationMachine;
use crate::store::MarketStore;

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MarketStore>,
    pub offers: Arc<OfferNegotiationMachine>,
    pub escrow: Arc<EscrowTransactionMachine>,
    pub disputes: Arc<DisputeResolutionWorkflow>,
    pub admin: Arc<AdminOverrideGateway>,
    /// Ed25519 public key for webhook signature verification. None disables
    /// verification (local runs against a provider stub).
    pub webhook_public_key: Option<Vec<u8>>,
}
