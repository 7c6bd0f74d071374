//! Fraud check input signals.

use serde::{Deserialize, Serialize};

/// Input signal bundle for a scoring pass.
///
/// Every field is optional: a missing signal is risk-neutral (zero
/// contribution), never an error. Numeric values outside their natural
/// domain are clamped by the rules, not rejected - scoring must never fail
/// for structurally valid input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FraudCheckParams {
    /// Age of the counterparty account in days.
    pub account_age_days: Option<f64>,
    /// Counterparty's prior completed transactions.
    pub prior_completed_transactions: Option<u32>,
    /// Counterparty's prior dispute count (any outcome).
    pub prior_disputes: Option<u32>,
    /// Counterparty's confirmed fraud disputes. Hard signal: one or more
    /// forces BLOCK regardless of the aggregate score.
    pub confirmed_fraud_disputes: Option<u32>,
    /// Absolute relative deviation of the asking price from the reference
    /// price (category median or original price): |asking - ref| / ref.
    pub price_deviation_ratio: Option<f64>,
    /// Messages exchanged between the parties before the offer.
    pub messages_exchanged: Option<u32>,
    /// Hours since the listing was published.
    pub listing_age_hours: Option<f64>,
    /// Account verification flags.
    pub email_verified: Option<bool>,
    pub phone_verified: Option<bool>,
    pub kyc_verified: Option<bool>,
    /// Device/IP risk flags.
    pub new_device: Option<bool>,
    pub geo_mismatch: Option<bool>,
    /// Offers created by the actor in the rolling one-hour window.
    pub offers_last_hour: Option<u32>,
    /// Transactions created by the actor in the rolling 24-hour window.
    pub transactions_last_day: Option<u32>,
}

impl FraudCheckParams {
    /// Clamp a non-negative float signal to its domain.
    ///
    /// NaN and negative values are treated as absent rather than rejected.
    pub(crate) fn clamp_non_negative(v: Option<f64>) -> Option<f64> {
        match v {
            Some(x) if x.is_finite() => Some(x.max(0.0)),
            _ => None,
        }
    }

    /// Clamp a ratio signal to [0, 1].
    pub(crate) fn clamp_ratio(v: Option<f64>) -> Option<f64> {
        Self::clamp_non_negative(v).map(|x| x.min(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(FraudCheckParams::clamp_non_negative(Some(-5.0)), Some(0.0));
        assert_eq!(FraudCheckParams::clamp_non_negative(Some(3.5)), Some(3.5));
        assert_eq!(FraudCheckParams::clamp_non_negative(Some(f64::NAN)), None);
        assert_eq!(
            FraudCheckParams::clamp_non_negative(Some(f64::INFINITY)),
            None
        );
        assert_eq!(FraudCheckParams::clamp_non_negative(None), None);
    }

    #[test]
    fn test_clamp_ratio() {
        assert_eq!(FraudCheckParams::clamp_ratio(Some(1.7)), Some(1.0));
        assert_eq!(FraudCheckParams::clamp_ratio(Some(0.4)), Some(0.4));
        assert_eq!(FraudCheckParams::clamp_ratio(Some(-0.1)), Some(0.0));
    }

    #[test]
    fn test_default_is_all_unknown() {
        let p = FraudCheckParams::default();
        assert!(p.account_age_days.is_none());
        assert!(p.confirmed_fraud_disputes.is_none());
        assert!(p.geo_mismatch.is_none());
    }
}
