//! Transaction status definitions and the central transition table.
//!
//! Status ids are designed for storage as SMALLINT.
//! Terminal states: COMPLETED (40), REFUNDED (-10), CANCELLED (-20).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction lifecycle states.
///
/// Forward-only except DISPUTED -> {COMPLETED, REFUNDED} and admin-forced
/// REFUNDED/CANCELLED from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum TransactionStatus {
    /// Created from an accepted offer, fraud gate not yet passed.
    Pending = 0,

    /// Held by the fraud gate (BLOCK recommendation); surfaced to operators.
    UnderReview = 5,

    /// Payment charge registered, waiting on the provider webhook.
    AwaitingPayment = 10,

    /// Funds collected and held in escrow.
    PaymentConfirmed = 20,

    /// Seller initiated the reservation transfer.
    Transferring = 30,

    /// Contested by either party; resolution decides the outcome.
    Disputed = 35,

    /// Terminal: transfer confirmed, funds released to the seller.
    Completed = 40,

    /// Terminal: funds returned to the buyer.
    Refunded = -10,

    /// Terminal: no funds moved (payment failed/expired, or admin cancel).
    Cancelled = -20,
}

impl TransactionStatus {
    /// No more transitions possible.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed
                | TransactionStatus::Refunded
                | TransactionStatus::Cancelled
        )
    }

    /// Escrow is holding collected funds in this state.
    #[inline]
    pub fn holds_funds(&self) -> bool {
        matches!(
            self,
            TransactionStatus::PaymentConfirmed
                | TransactionStatus::Transferring
                | TransactionStatus::Disputed
        )
    }

    /// The single source of truth for legal normal-trigger transitions.
    ///
    /// Admin overrides are a separate transition kind; see
    /// [`TransactionStatus::admin_override_allowed`].
    pub fn can_transition(from: Self, to: Self) -> bool {
        use TransactionStatus::*;
        matches!(
            (from, to),
            (Pending, AwaitingPayment)
                | (Pending, UnderReview)
                | (Pending, Cancelled)
                | (UnderReview, Pending)
                | (UnderReview, Cancelled)
                | (AwaitingPayment, PaymentConfirmed)
                | (AwaitingPayment, Cancelled)
                | (PaymentConfirmed, Transferring)
                | (PaymentConfirmed, Disputed)
                | (Transferring, Completed)
                | (Transferring, Disputed)
                | (Disputed, Completed)
                | (Disputed, Refunded)
        )
    }

    /// Admin override: any non-terminal state may be forced to REFUNDED or
    /// CANCELLED.
    pub fn admin_override_allowed(from: Self, to: Self) -> bool {
        !from.is_terminal()
            && matches!(to, TransactionStatus::Refunded | TransactionStatus::Cancelled)
    }

    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransactionStatus::Pending),
            5 => Some(TransactionStatus::UnderReview),
            10 => Some(TransactionStatus::AwaitingPayment),
            20 => Some(TransactionStatus::PaymentConfirmed),
            30 => Some(TransactionStatus::Transferring),
            35 => Some(TransactionStatus::Disputed),
            40 => Some(TransactionStatus::Completed),
            -10 => Some(TransactionStatus::Refunded),
            -20 => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::UnderReview => "UNDER_REVIEW",
            TransactionStatus::AwaitingPayment => "AWAITING_PAYMENT",
            TransactionStatus::PaymentConfirmed => "PAYMENT_CONFIRMED",
            TransactionStatus::Transferring => "TRANSFERRING",
            TransactionStatus::Disputed => "DISPUTED",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Refunded => "REFUNDED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<i16> for TransactionStatus {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        TransactionStatus::from_id(value).ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::TransactionStatus::*;
    use super::*;

    const ALL: [TransactionStatus; 9] = [
        Pending,
        UnderReview,
        AwaitingPayment,
        PaymentConfirmed,
        Transferring,
        Disputed,
        Completed,
        Refunded,
        Cancelled,
    ];

    #[test]
    fn test_terminal_states() {
        assert!(Completed.is_terminal());
        assert!(Refunded.is_terminal());
        assert!(Cancelled.is_terminal());
        for s in [Pending, UnderReview, AwaitingPayment, PaymentConfirmed, Transferring, Disputed] {
            assert!(!s.is_terminal(), "{s} must not be terminal");
        }
    }

    #[test]
    fn test_id_roundtrip() {
        for s in ALL {
            assert_eq!(TransactionStatus::from_id(s.id()), Some(s));
        }
        assert_eq!(TransactionStatus::from_id(999), None);
    }

    #[test]
    fn test_disputed_only_from_funded_states() {
        for from in ALL {
            let allowed = TransactionStatus::can_transition(from, Disputed);
            assert_eq!(
                allowed,
                matches!(from, PaymentConfirmed | Transferring),
                "DISPUTED reachable from {from}"
            );
        }
    }

    #[test]
    fn test_completed_requires_payment_path() {
        // COMPLETED is only reachable from TRANSFERRING or DISPUTED, both of
        // which sit strictly after PAYMENT_CONFIRMED.
        for from in ALL {
            let allowed = TransactionStatus::can_transition(from, Completed);
            assert_eq!(allowed, matches!(from, Transferring | Disputed));
        }
    }

    #[test]
    fn test_no_transitions_out_of_terminal() {
        for from in [Completed, Refunded, Cancelled] {
            for to in ALL {
                assert!(!TransactionStatus::can_transition(from, to));
                assert!(!TransactionStatus::admin_override_allowed(from, to));
            }
        }
    }

    #[test]
    fn test_admin_override_targets() {
        assert!(TransactionStatus::admin_override_allowed(Transferring, Refunded));
        assert!(TransactionStatus::admin_override_allowed(Pending, Cancelled));
        assert!(TransactionStatus::admin_override_allowed(Disputed, Refunded));
        assert!(!TransactionStatus::admin_override_allowed(Transferring, Completed));
        assert!(!TransactionStatus::admin_override_allowed(Refunded, Cancelled));
    }

    #[test]
    fn test_holds_funds() {
        assert!(PaymentConfirmed.holds_funds());
        assert!(Transferring.holds_funds());
        assert!(Disputed.holds_funds());
        assert!(!AwaitingPayment.holds_funds());
        assert!(!Completed.holds_funds());
    }
}
