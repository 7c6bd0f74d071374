//! Escrowed transaction machine.
//!
//! Owns the lifecycle of money from offer acceptance to completion, refund,
//! or cancellation. Collected funds stay in escrow until transfer conditions
//! are verified, then release to the seller or return to the buyer.
//!
//! ## Components
//! - `state`: the closed transaction status type and its transition table
//! - `types`: Transaction/Payment records and webhook events
//! - `machine`: the transition driver (fraud gate, webhook ingestion,
//!   transfer/completion, disputes, deadline expiry)
//! - `sweeper`: background deadline sweep

pub mod machine;
pub mod state;
pub mod sweeper;
pub mod types;

pub use machine::{EscrowConfig, EscrowTransactionMachine, WebhookOutcome};
pub use state::TransactionStatus;
pub use sweeper::{EscrowSweeper, SweeperConfig};
pub use types::{
    AdjustmentKind, Payment, PaymentAdjustment, PaymentEvent, PaymentEventKind, PaymentStatus,
    Transaction,
};
