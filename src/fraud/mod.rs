//! Fraud-risk scoring engine.
//!
//! Pure and deterministic: a bundle of risk signals maps through a documented
//! rule table into a bounded score, a risk level, and a recommendation. No
//! I/O, no clock, no failure path - malformed numeric inputs are clamped and
//! unknown optional inputs contribute zero.
//!
//! ## Components
//! - `params`: input signal bundle with domain clamping
//! - `rules`: the rule table (weights and directions, auditable)
//! - `engine`: aggregation, thresholds, hard-signal short circuit

pub mod engine;
pub mod params;
pub mod rules;

pub use engine::{FraudCheckResult, Recommendation, RiskLevel, score};
pub use params::FraudCheckParams;
pub use rules::{RuleId, SignalContribution};
