//! Order status state machine.

use serde::{Deserialize, Serialize};

use crate::lifecycle::{Milestone, Status};

/// The status of an order in its lifecycle.
///
/// ```text
/// pending ──► paid ──► processing ──► shipped ──► completed
///    │          │          │             │
///    └──────────┴──────────┴─────────────┴──► canceled | refunded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created at checkout, awaiting payment.
    #[default]
    Pending,

    /// Payment confirmed.
    Paid,

    /// Being prepared by staff.
    Processing,

    /// Handed to the carrier.
    Shipped,

    /// Delivered (terminal state).
    Completed,

    /// Canceled before completion (terminal state).
    Canceled,

    /// Payment returned to the customer (terminal state).
    Refunded,
}

impl OrderStatus {
    /// All statuses, in declaration order.
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Completed,
        OrderStatus::Canceled,
        OrderStatus::Refunded,
    ];

    /// Parses the wire name of a status.
    pub fn parse(s: &str) -> Option<OrderStatus> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl Status for OrderStatus {
    const INITIAL: Self = OrderStatus::Pending;
    const PAID: Self = OrderStatus::Paid;
    const PAYMENT_FAILED: Self = OrderStatus::Canceled;

    fn rank(&self) -> Option<u8> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Paid => Some(1),
            OrderStatus::Processing => Some(2),
            OrderStatus::Shipped => Some(3),
            OrderStatus::Completed => Some(4),
            OrderStatus::Canceled | OrderStatus::Refunded => None,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Completed | OrderStatus::Canceled | OrderStatus::Refunded
        )
    }

    fn can_branch_from(&self, from: Self) -> bool {
        matches!(self, OrderStatus::Canceled | OrderStatus::Refunded) && !from.is_terminal()
    }

    fn milestone(&self) -> Option<Milestone> {
        match self {
            OrderStatus::Paid => Some(Milestone::Paid),
            OrderStatus::Canceled => Some(Milestone::Canceled),
            OrderStatus::Refunded => Some(Milestone::Refunded),
            OrderStatus::Completed => Some(Milestone::Completed),
            OrderStatus::Pending | OrderStatus::Processing | OrderStatus::Shipped => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{Lifecycle, TransitionError, validate_transition};
    use chrono::Utc;

    use OrderStatus::*;

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), Pending);
    }

    #[test]
    fn test_forward_moves_are_allowed() {
        assert!(validate_transition(Pending, Paid).is_ok());
        assert!(validate_transition(Paid, Processing).is_ok());
        assert!(validate_transition(Processing, Shipped).is_ok());
        assert!(validate_transition(Shipped, Completed).is_ok());
        assert!(validate_transition(Paid, Shipped).is_ok());
    }

    #[test]
    fn test_forward_skip_cannot_bypass_payment() {
        for to in [Processing, Shipped, Completed] {
            assert_eq!(
                validate_transition(Pending, to),
                Err(TransitionError::SkipsPayment {
                    from: "pending",
                    to: to.as_str()
                }),
                "pending -> {to}"
            );
        }
        assert!(validate_transition(Paid, Completed).is_ok());
    }

    #[test]
    fn test_backward_moves_are_rejected() {
        assert_eq!(
            validate_transition(Shipped, Paid),
            Err(TransitionError::Backward {
                from: "shipped",
                to: "paid"
            })
        );
        assert!(validate_transition(Paid, Pending).is_err());
    }

    #[test]
    fn test_side_branches_from_any_open_state() {
        for from in [Pending, Paid, Processing, Shipped] {
            assert!(validate_transition(from, Canceled).is_ok(), "{from} -> canceled");
            assert!(validate_transition(from, Refunded).is_ok(), "{from} -> refunded");
        }
    }

    #[test]
    fn test_no_transition_out_of_terminal_states() {
        for from in [Completed, Canceled, Refunded] {
            for to in OrderStatus::ALL {
                assert!(
                    matches!(
                        validate_transition(from, to),
                        Err(TransitionError::FromTerminal { .. })
                    ),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_same_status_is_rejected() {
        assert_eq!(
            validate_transition(Paid, Paid),
            Err(TransitionError::Unchanged { status: "paid" })
        );
    }

    #[test]
    fn test_validator_is_deterministic_over_all_pairs() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                assert_eq!(validate_transition(from, to), validate_transition(from, to));
            }
        }
    }

    #[test]
    fn test_paid_or_later() {
        assert!(!Pending.is_paid_or_later());
        assert!(Paid.is_paid_or_later());
        assert!(Shipped.is_paid_or_later());
        assert!(Completed.is_paid_or_later());
        assert!(!Canceled.is_paid_or_later());
        assert!(!Refunded.is_paid_or_later());
    }

    #[test]
    fn test_lifecycle_records_history_and_milestones() {
        let t0 = Utc::now();
        let mut lifecycle: Lifecycle<OrderStatus> = Lifecycle::start("checkout", t0);
        lifecycle
            .transition(Paid, "gateway", Some("payment verified".into()), t0)
            .unwrap();
        lifecycle.transition(Completed, "staff", None, t0).unwrap();

        assert_eq!(lifecycle.status(), Completed);
        assert_eq!(lifecycle.history().len(), 3);
        assert_eq!(lifecycle.history()[1].actor, "gateway");
        assert_eq!(lifecycle.paid_at(), Some(t0));
        assert_eq!(lifecycle.completed_at(), Some(t0));
        assert!(lifecycle.canceled_at().is_none());
    }

    #[test]
    fn test_ensure_paid_at_only_fills_a_missing_stamp() {
        let t0 = Utc::now();
        let mut lifecycle: Lifecycle<OrderStatus> = Lifecycle::start("checkout", t0);
        assert!(!lifecycle.ensure_paid_at(t0));
        assert!(lifecycle.paid_at().is_none());

        lifecycle.transition(Paid, "staff", None, t0).unwrap();
        assert!(!lifecycle.ensure_paid_at(Utc::now()));
        assert_eq!(lifecycle.paid_at(), Some(t0));
    }

    #[test]
    fn test_rejected_transition_leaves_lifecycle_untouched() {
        let mut lifecycle: Lifecycle<OrderStatus> = Lifecycle::start("checkout", Utc::now());
        lifecycle.transition(Canceled, "staff", None, Utc::now()).unwrap();
        let before = lifecycle.clone();

        assert!(lifecycle.transition(Paid, "gateway", None, Utc::now()).is_err());
        assert_eq!(lifecycle, before);
    }

    #[test]
    fn test_parse_and_display() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::parse(&status.to_string()), Some(status));
        }
        assert_eq!(OrderStatus::parse("lost"), None);
    }

    #[test]
    fn test_serialization_uses_snake_case() {
        let json = serde_json::to_string(&Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
