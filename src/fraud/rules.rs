//! The fraud rule table.
//!
//! Each rule maps one signal to a bounded contribution in score points.
//! Positive points raise risk, negative points lower it. The table below is
//! the authoritative weight documentation; `evaluate_all` applies it in
//! order, returning only the rules that actually fired so results stay
//! auditable.
//!
//! | Rule | Signal | Contribution |
//! |---|---|---|
//! | AccountAge | age < 3d / < 14d / < 60d | +15 / +10 / +4 |
//! | AccountAge | age >= 365d / >= 180d | -8 / -4 |
//! | CompletedHistory | 0 done / 1-2 done | +8 / +4 |
//! | CompletedHistory | >= 20 done / >= 5 done | -10 / -4 |
//! | PriorDisputes | per dispute, capped at 4 | +15 each |
//! | ConfirmedFraud | >= 1 confirmed fraud dispute | +40, hard BLOCK |
//! | PriceDeviation | >= 80% / >= 60% / >= 30% / >= 15% off reference | +32 / +25 / +14 / +6 |
//! | MessageHistory | no messages before offer | +6 |
//! | MessageHistory | >= 5 messages | -4 |
//! | ListingAge | < 1h / < 24h since publish | +8 / +4 |
//! | EmailVerification | unverified / verified | +4 / -2 |
//! | PhoneVerification | unverified / verified | +4 / -2 |
//! | KycVerification | unverified / verified | +6 / -10 |
//! | NewDevice | first seen device | +8 |
//! | GeoMismatch | IP geolocation mismatch | +10 |
//! | OfferVelocity | >= 10 offers/h / >= 5 offers/h | +18 / +12 |
//! | TransactionVelocity | >= 3 transactions/day | +10 |

use serde::{Deserialize, Serialize};

use super::params::FraudCheckParams;

/// Rule identifiers, stable for audit logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleId {
    AccountAge,
    CompletedHistory,
    PriorDisputes,
    ConfirmedFraud,
    PriceDeviation,
    MessageHistory,
    ListingAge,
    EmailVerification,
    PhoneVerification,
    KycVerification,
    NewDevice,
    GeoMismatch,
    OfferVelocity,
    TransactionVelocity,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::AccountAge => "ACCOUNT_AGE",
            RuleId::CompletedHistory => "COMPLETED_HISTORY",
            RuleId::PriorDisputes => "PRIOR_DISPUTES",
            RuleId::ConfirmedFraud => "CONFIRMED_FRAUD",
            RuleId::PriceDeviation => "PRICE_DEVIATION",
            RuleId::MessageHistory => "MESSAGE_HISTORY",
            RuleId::ListingAge => "LISTING_AGE",
            RuleId::EmailVerification => "EMAIL_VERIFICATION",
            RuleId::PhoneVerification => "PHONE_VERIFICATION",
            RuleId::KycVerification => "KYC_VERIFICATION",
            RuleId::NewDevice => "NEW_DEVICE",
            RuleId::GeoMismatch => "GEO_MISMATCH",
            RuleId::OfferVelocity => "OFFER_VELOCITY",
            RuleId::TransactionVelocity => "TRANSACTION_VELOCITY",
        }
    }
}

/// One fired rule with its score contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalContribution {
    pub rule: RuleId,
    pub points: f64,
}

/// Whether the params carry a hard signal that forces BLOCK.
pub fn hard_signal(params: &FraudCheckParams) -> bool {
    params.confirmed_fraud_disputes.unwrap_or(0) >= 1
}

/// Evaluate the full rule table, in table order.
///
/// Rules that do not fire (unknown input, or zero contribution) are omitted
/// from the breakdown.
pub fn evaluate_all(params: &FraudCheckParams) -> Vec<SignalContribution> {
    let mut out = Vec::new();
    let mut push = |rule: RuleId, points: f64| {
        if points != 0.0 {
            out.push(SignalContribution { rule, points });
        }
    };

    if let Some(days) = FraudCheckParams::clamp_non_negative(params.account_age_days) {
        let pts = if days < 3.0 {
            15.0
        } else if days < 14.0 {
            10.0
        } else if days < 60.0 {
            4.0
        } else if days >= 365.0 {
            -8.0
        } else if days >= 180.0 {
            -4.0
        } else {
            0.0
        };
        push(RuleId::AccountAge, pts);
    }

    if let Some(done) = params.prior_completed_transactions {
        let pts = match done {
            0 => 8.0,
            1..=2 => 4.0,
            3..=4 => 0.0,
            5..=19 => -4.0,
            _ => -10.0,
        };
        push(RuleId::CompletedHistory, pts);
    }

    if let Some(disputes) = params.prior_disputes {
        push(RuleId::PriorDisputes, f64::from(disputes.min(4)) * 15.0);
    }

    if params.confirmed_fraud_disputes.unwrap_or(0) >= 1 {
        push(RuleId::ConfirmedFraud, 40.0);
    }

    if let Some(dev) = FraudCheckParams::clamp_ratio(params.price_deviation_ratio) {
        let pts = if dev >= 0.8 {
            32.0
        } else if dev >= 0.6 {
            25.0
        } else if dev >= 0.3 {
            14.0
        } else if dev >= 0.15 {
            6.0
        } else {
            0.0
        };
        push(RuleId::PriceDeviation, pts);
    }

    if let Some(messages) = params.messages_exchanged {
        let pts = match messages {
            0 => 6.0,
            1..=4 => 0.0,
            _ => -4.0,
        };
        push(RuleId::MessageHistory, pts);
    }

    if let Some(hours) = FraudCheckParams::clamp_non_negative(params.listing_age_hours) {
        let pts = if hours < 1.0 {
            8.0
        } else if hours < 24.0 {
            4.0
        } else {
            0.0
        };
        push(RuleId::ListingAge, pts);
    }

    if let Some(v) = params.email_verified {
        push(RuleId::EmailVerification, if v { -2.0 } else { 4.0 });
    }
    if let Some(v) = params.phone_verified {
        push(RuleId::PhoneVerification, if v { -2.0 } else { 4.0 });
    }
    if let Some(v) = params.kyc_verified {
        push(RuleId::KycVerification, if v { -10.0 } else { 6.0 });
    }

    if params.new_device == Some(true) {
        push(RuleId::NewDevice, 8.0);
    }
    if params.geo_mismatch == Some(true) {
        push(RuleId::GeoMismatch, 10.0);
    }

    if let Some(offers) = params.offers_last_hour {
        let pts = if offers >= 10 {
            18.0
        } else if offers >= 5 {
            12.0
        } else {
            0.0
        };
        push(RuleId::OfferVelocity, pts);
    }

    if params.transactions_last_day.unwrap_or(0) >= 3 {
        push(RuleId::TransactionVelocity, 10.0);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contribution(params: &FraudCheckParams, rule: RuleId) -> Option<f64> {
        evaluate_all(params)
            .into_iter()
            .find(|c| c.rule == rule)
            .map(|c| c.points)
    }

    #[test]
    fn test_account_age_direction() {
        let young = FraudCheckParams {
            account_age_days: Some(1.0),
            ..Default::default()
        };
        let old = FraudCheckParams {
            account_age_days: Some(400.0),
            ..Default::default()
        };
        assert_eq!(contribution(&young, RuleId::AccountAge), Some(15.0));
        assert_eq!(contribution(&old, RuleId::AccountAge), Some(-8.0));
    }

    #[test]
    fn test_prior_disputes_capped() {
        let p = FraudCheckParams {
            prior_disputes: Some(50),
            ..Default::default()
        };
        assert_eq!(contribution(&p, RuleId::PriorDisputes), Some(60.0));
    }

    #[test]
    fn test_price_deviation_tiers() {
        let at = |ratio: f64| {
            contribution(
                &FraudCheckParams {
                    price_deviation_ratio: Some(ratio),
                    ..Default::default()
                },
                RuleId::PriceDeviation,
            )
        };
        assert_eq!(at(0.1), None);
        assert_eq!(at(0.15), Some(6.0));
        assert_eq!(at(0.3), Some(14.0));
        assert_eq!(at(0.6), Some(25.0));
        assert_eq!(at(0.8), Some(32.0));
        assert_eq!(at(0.9), Some(32.0));
    }

    #[test]
    fn test_hard_signal() {
        let clean = FraudCheckParams::default();
        let dirty = FraudCheckParams {
            confirmed_fraud_disputes: Some(1),
            ..Default::default()
        };
        assert!(!hard_signal(&clean));
        assert!(hard_signal(&dirty));
    }

    #[test]
    fn test_unknown_inputs_fire_nothing() {
        assert!(evaluate_all(&FraudCheckParams::default()).is_empty());
    }

    #[test]
    fn test_negative_inputs_clamped_not_rejected() {
        let p = FraudCheckParams {
            account_age_days: Some(-10.0),
            price_deviation_ratio: Some(9.0),
            ..Default::default()
        };
        // -10 days clamps to 0 (young account), deviation clamps to 1.0.
        assert_eq!(contribution(&p, RuleId::AccountAge), Some(15.0));
        assert_eq!(contribution(&p, RuleId::PriceDeviation), Some(32.0));
    }
}
