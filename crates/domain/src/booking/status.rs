use serde::{Deserialize, Serialize};

use crate::lifecycle::{Milestone, Status};

/// The status of a service booking.
///
/// ```text
/// pending ──► paid ──► confirmed ──► completed
///    │          │          │
///    └──────────┴──────────┴──► canceled | refunded
///               └──────────┴──► no_show
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[default]
    Pending,
    Paid,
    /// Slot confirmed by staff.
    Confirmed,
    Completed,
    Canceled,
    Refunded,
    /// Customer did not attend a paid slot.
    NoShow,
}

impl BookingStatus {
    /// All statuses, in declaration order.
    pub const ALL: [BookingStatus; 7] = [
        BookingStatus::Pending,
        BookingStatus::Paid,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Canceled,
        BookingStatus::Refunded,
        BookingStatus::NoShow,
    ];

    /// Parses the wire name of a status.
    pub fn parse(s: &str) -> Option<BookingStatus> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl Status for BookingStatus {
    const INITIAL: Self = BookingStatus::Pending;
    const PAID: Self = BookingStatus::Paid;
    const PAYMENT_FAILED: Self = BookingStatus::Canceled;

    fn rank(&self) -> Option<u8> {
        match self {
            BookingStatus::Pending => Some(0),
            BookingStatus::Paid => Some(1),
            BookingStatus::Confirmed => Some(2),
            BookingStatus::Completed => Some(3),
            BookingStatus::Canceled | BookingStatus::Refunded | BookingStatus::NoShow => None,
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed
                | BookingStatus::Canceled
                | BookingStatus::Refunded
                | BookingStatus::NoShow
        )
    }

    fn can_branch_from(&self, from: Self) -> bool {
        match self {
            BookingStatus::Canceled | BookingStatus::Refunded => !from.is_terminal(),
            // A no-show only makes sense for a slot that was paid for
            BookingStatus::NoShow => {
                matches!(from, BookingStatus::Paid | BookingStatus::Confirmed)
            }
            _ => false,
        }
    }

    fn milestone(&self) -> Option<Milestone> {
        match self {
            BookingStatus::Paid => Some(Milestone::Paid),
            BookingStatus::Canceled => Some(Milestone::Canceled),
            BookingStatus::Refunded => Some(Milestone::Refunded),
            BookingStatus::Completed => Some(Milestone::Completed),
            BookingStatus::Pending | BookingStatus::Confirmed | BookingStatus::NoShow => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Paid => "paid",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Canceled => "canceled",
            BookingStatus::Refunded => "refunded",
            BookingStatus::NoShow => "no_show",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
