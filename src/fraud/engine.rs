//! Score aggregation, thresholds, and the recommendation tie-break.

use serde::{Deserialize, Serialize};

use super::params::FraudCheckParams;
use super::rules::{self, SignalContribution};

/// Risk level derived from the aggregate score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Threshold table: [0,25) LOW, [25,50) MEDIUM, [50,75) HIGH,
    /// [75,100] CRITICAL.
    pub fn from_score(score: f64) -> Self {
        if score < 25.0 {
            RiskLevel::Low
        } else if score < 50.0 {
            RiskLevel::Medium
        } else if score < 75.0 {
            RiskLevel::High
        } else {
            RiskLevel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }
}

/// Gate recommendation for the escrow machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Allow,
    Review,
    Block,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Allow => "ALLOW",
            Recommendation::Review => "REVIEW",
            Recommendation::Block => "BLOCK",
        }
    }
}

/// Output of a scoring pass.
///
/// Carries the per-rule breakdown for audit/logging, not just the final
/// number. Never persisted as authoritative truth without a timestamp and an
/// input snapshot alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudCheckResult {
    /// Aggregate score, clamped to [0, 100].
    pub score: f64,
    pub level: RiskLevel,
    pub recommendation: Recommendation,
    /// Per-rule contributions, in rule-table order.
    pub signals: Vec<SignalContribution>,
    /// True when a hard signal short-circuited the soft aggregation.
    pub hard_blocked: bool,
}

/// Evaluate a signal bundle. Pure and deterministic; never fails.
pub fn score(params: &FraudCheckParams) -> FraudCheckResult {
    let signals = rules::evaluate_all(params);
    let total: f64 = signals.iter().map(|c| c.points).sum();
    let score = total.clamp(0.0, 100.0);
    let level = RiskLevel::from_score(score);

    let hard_blocked = rules::hard_signal(params);
    let recommendation = if hard_blocked {
        Recommendation::Block
    } else {
        match level {
            RiskLevel::Low | RiskLevel::Medium => Recommendation::Allow,
            RiskLevel::High => Recommendation::Review,
            RiskLevel::Critical => Recommendation::Block,
        }
    };

    FraudCheckResult {
        score,
        level,
        recommendation,
        signals,
        hard_blocked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_score_in_range_for_extremes() {
        let worst = FraudCheckParams {
            account_age_days: Some(0.0),
            prior_completed_transactions: Some(0),
            prior_disputes: Some(10),
            confirmed_fraud_disputes: Some(3),
            price_deviation_ratio: Some(1.0),
            messages_exchanged: Some(0),
            listing_age_hours: Some(0.0),
            email_verified: Some(false),
            phone_verified: Some(false),
            kyc_verified: Some(false),
            new_device: Some(true),
            geo_mismatch: Some(true),
            offers_last_hour: Some(50),
            transactions_last_day: Some(50),
        };
        let best = FraudCheckParams {
            account_age_days: Some(1000.0),
            prior_completed_transactions: Some(100),
            prior_disputes: Some(0),
            messages_exchanged: Some(20),
            email_verified: Some(true),
            phone_verified: Some(true),
            kyc_verified: Some(true),
            ..Default::default()
        };

        let high = score(&worst);
        let low = score(&best);
        assert!((0.0..=100.0).contains(&high.score));
        assert!((0.0..=100.0).contains(&low.score));
        assert_eq!(high.score, 100.0);
        assert_eq!(low.score, 0.0);
        assert_eq!(low.level, RiskLevel::Low);
        assert_eq!(low.recommendation, Recommendation::Allow);
    }

    #[test]
    fn test_threshold_boundaries_exact() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(24.999), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(25.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(49.999), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(50.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(74.999), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(75.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(100.0), RiskLevel::Critical);
    }

    #[test]
    fn test_scoring_is_pure() {
        let params = FraudCheckParams {
            account_age_days: Some(12.0),
            prior_disputes: Some(1),
            geo_mismatch: Some(true),
            ..Default::default()
        };
        assert_eq!(score(&params), score(&params));
    }

    #[test]
    fn test_empty_params_neutral() {
        let result = score(&FraudCheckParams::default());
        assert_eq!(result.score, 0.0);
        assert_eq!(result.level, RiskLevel::Low);
        assert_eq!(result.recommendation, Recommendation::Allow);
        assert!(result.signals.is_empty());
    }

    /// Randomized check: a confirmed fraud dispute forces BLOCK no matter
    /// what the other fields look like.
    #[test]
    fn test_hard_signal_dominates_randomized() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let params = FraudCheckParams {
                account_age_days: Some(rng.gen_range(0.0..2000.0)),
                prior_completed_transactions: Some(rng.gen_range(0..200)),
                prior_disputes: Some(rng.gen_range(0..10)),
                confirmed_fraud_disputes: Some(rng.gen_range(1..5)),
                price_deviation_ratio: Some(rng.r#gen::<f64>()),
                messages_exchanged: Some(rng.gen_range(0..50)),
                listing_age_hours: Some(rng.gen_range(0.0..1000.0)),
                email_verified: Some(rng.r#gen()),
                phone_verified: Some(rng.r#gen()),
                kyc_verified: Some(rng.r#gen()),
                new_device: Some(rng.r#gen()),
                geo_mismatch: Some(rng.r#gen()),
                offers_last_hour: Some(rng.gen_range(0..30)),
                transactions_last_day: Some(rng.gen_range(0..30)),
            };
            let result = score(&params);
            assert_eq!(result.recommendation, Recommendation::Block);
            assert!(result.hard_blocked);
        }
    }

    /// Scenario from the risk playbook: day-old account, two prior disputes,
    /// listing priced 90% off reference.
    #[test]
    fn test_risky_newcomer_scenario() {
        let params = FraudCheckParams {
            account_age_days: Some(1.0),
            prior_disputes: Some(2),
            price_deviation_ratio: Some(0.9),
            ..Default::default()
        };
        let result = score(&params);
        assert_eq!(result.score, 77.0);
        assert_eq!(result.level, RiskLevel::Critical);
        assert_eq!(result.recommendation, Recommendation::Block);
        assert!(!result.hard_blocked);
    }

    #[test]
    fn test_breakdown_sums_to_score_when_unclamped() {
        let params = FraudCheckParams {
            account_age_days: Some(5.0),
            prior_disputes: Some(1),
            new_device: Some(true),
            ..Default::default()
        };
        let result = score(&params);
        let sum: f64 = result.signals.iter().map(|c| c.points).sum();
        assert_eq!(result.score, sum);
    }
}
