//! SeatSwap - trust-and-safety decision core for a P2P reservation
//! marketplace.
//!
//! Everything that moves money or changes who holds a reservation flows
//! through the state machines in this crate: fraud scoring gates new
//! transactions, offers negotiate price, escrow holds funds until transfer
//! conditions are verified, disputes and admin overrides settle the rest.
//!
//! # Modules
//!
//! - [`core_types`] - Identifier types and roles
//! - [`error`] - Crate-wide error taxonomy
//! - [`fraud`] - Pure fraud scoring engine (rules, thresholds, gate)
//! - [`listing`] - Listing entity and status
//! - [`account`] - Trust-relevant user profile read model
//! - [`offer`] - Offer negotiation machine
//! - [`escrow`] - Escrowed transaction machine and deadline sweeper
//! - [`dispute`] - Dispute records and resolution workflow
//! - [`admin`] - Forced refund/cancel overrides
//! - [`store`] - Persistence port (memory and Postgres backends)
//! - [`payment`] - Payment provider port (HTTP and mock adapters)
//! - [`api_auth`] - Partner API-key authentication
//! - [`gateway`] - Axum HTTP surface

// Core types - must be first!
pub mod core_types;

pub mod account;
pub mod admin;
pub mod api_auth;
pub mod config;
pub mod dispute;
pub mod error;
pub mod escrow;
pub mod fraud;
pub mod gateway;
pub mod listing;
pub mod logging;
pub mod offer;
pub mod payment;
pub mod store;

// Convenient re-exports at crate root
pub use core_types::{DisputeId, ListingId, OfferId, PaymentId, Role, TransactionId, UserId};
pub use error::CoreError;
pub use escrow::{EscrowConfig, EscrowTransactionMachine, TransactionStatus, WebhookOutcome};
pub use fraud::{FraudCheckParams, FraudCheckResult, Recommendation, RiskLevel};
pub use listing::{Listing, ListingStatus};
pub use offer::{OfferAction, OfferNegotiationMachine, OfferOutcome, OfferStatus};
pub use store::{MarketStore, MemoryStore, PgStore};
