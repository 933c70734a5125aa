//! Status state machines shared by orders and bookings.
//!
//! A status either sits on the forward sequence (`pending -> paid -> ...`)
//! or is a side branch (`canceled`, `refunded`, ...) that can be entered
//! from open states. Terminal statuses admit no further transitions.
//! Forward moves may skip statuses, but never the paid status itself.

use std::fmt::{Debug, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Which dedicated timestamp a status stamps when entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Milestone {
    Paid,
    Canceled,
    Refunded,
    Completed,
}

/// Behavior every status enum provides to the transition validator.
pub trait Status:
    Copy + Eq + Debug + Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Status a new record starts in.
    const INITIAL: Self;

    /// Status recording a confirmed payment.
    const PAID: Self;

    /// Status used when a payment fails before it was ever confirmed.
    const PAYMENT_FAILED: Self;

    /// Position on the forward sequence; `None` for side branches.
    fn rank(&self) -> Option<u8>;

    /// True if no transition may leave this status.
    fn is_terminal(&self) -> bool;

    /// True if this side-branch status may be entered from `from`.
    fn can_branch_from(&self, from: Self) -> bool;

    /// Timestamp stamped when this status is entered.
    fn milestone(&self) -> Option<Milestone>;

    /// Wire name of the status.
    fn as_str(&self) -> &'static str;

    /// True if the record has reached or moved beyond `PAID` on the forward sequence.
    fn is_paid_or_later(&self) -> bool {
        match (self.rank(), Self::PAID.rank()) {
            (Some(current), Some(paid)) => current >= paid,
            _ => false,
        }
    }
}

/// A requested transition that the state machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The current status is terminal.
    #[error("cannot move from terminal status {from} to {to}")]
    FromTerminal { from: &'static str, to: &'static str },

    /// The requested status equals the current one.
    #[error("status is already {status}")]
    Unchanged { status: &'static str },

    /// The request moves backwards along the sequence.
    #[error("cannot move backwards from {from} to {to}")]
    Backward { from: &'static str, to: &'static str },

    /// The request moves past the paid status without entering it.
    #[error("cannot move from {from} to {to} without passing through payment")]
    SkipsPayment { from: &'static str, to: &'static str },

    /// The target cannot be reached from the current status.
    #[error("transition from {from} to {to} is not allowed")]
    NotAllowed { from: &'static str, to: &'static str },
}

/// Decides whether `from -> to` is an allowed transition.
///
/// Pure: no state is read or written besides the two arguments.
pub fn validate_transition<S: Status>(from: S, to: S) -> Result<(), TransitionError> {
    if from.is_terminal() {
        return Err(TransitionError::FromTerminal {
            from: from.as_str(),
            to: to.as_str(),
        });
    }
    if from == to {
        return Err(TransitionError::Unchanged {
            status: from.as_str(),
        });
    }
    if to.can_branch_from(from) {
        return Ok(());
    }
    match (from.rank(), to.rank(), S::PAID.rank()) {
        // Everything past paid presumes a recorded payment.
        (Some(a), Some(b), Some(paid)) if a < paid && b > paid => {
            Err(TransitionError::SkipsPayment {
                from: from.as_str(),
                to: to.as_str(),
            })
        }
        (Some(a), Some(b), _) if b > a => Ok(()),
        (Some(_), Some(_), _) => Err(TransitionError::Backward {
            from: from.as_str(),
            to: to.as_str(),
        }),
        _ => Err(TransitionError::NotAllowed {
            from: from.as_str(),
            to: to.as_str(),
        }),
    }
}

/// One entry of the append-only status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange<S> {
    pub status: S,
    pub at: DateTime<Utc>,
    pub actor: String,
    pub reason: Option<String>,
}

/// Status, history and milestone timestamps of an order or booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "S: Status")]
pub struct Lifecycle<S> {
    status: S,
    history: Vec<StatusChange<S>>,
    paid_at: Option<DateTime<Utc>>,
    canceled_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl<S: Status> Lifecycle<S> {
    /// Starts a lifecycle in the initial status, recording creation in history.
    pub fn start(actor: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: S::INITIAL,
            history: vec![StatusChange {
                status: S::INITIAL,
                at,
                actor: actor.into(),
                reason: Some("created".to_string()),
            }],
            paid_at: None,
            canceled_at: None,
            refunded_at: None,
            completed_at: None,
        }
    }

    /// Returns the current status.
    pub fn status(&self) -> S {
        self.status
    }

    /// Returns the status history, oldest first.
    pub fn history(&self) -> &[StatusChange<S>] {
        &self.history
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn canceled_at(&self) -> Option<DateTime<Utc>> {
        self.canceled_at
    }

    pub fn refunded_at(&self) -> Option<DateTime<Utc>> {
        self.refunded_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Applies a validated transition.
    ///
    /// On rejection nothing is modified.
    pub fn transition(
        &mut self,
        to: S,
        actor: impl Into<String>,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        validate_transition(self.status, to)?;

        self.status = to;
        self.history.push(StatusChange {
            status: to,
            at,
            actor: actor.into(),
            reason,
        });
        match to.milestone() {
            Some(Milestone::Paid) => self.paid_at = Some(at),
            Some(Milestone::Canceled) => self.canceled_at = Some(at),
            Some(Milestone::Refunded) => self.refunded_at = Some(at),
            Some(Milestone::Completed) => self.completed_at = Some(at),
            None => {}
        }
        Ok(())
    }

    /// Stamps `paid_at` if the record reached its paid status without it.
    ///
    /// Returns true if the timestamp was missing.
    pub fn ensure_paid_at(&mut self, at: DateTime<Utc>) -> bool {
        if self.paid_at.is_some() || !self.status.is_paid_or_later() {
            return false;
        }
        self.paid_at = Some(at);
        true
    }
}

/// Persisted idempotency flags guarding inventory side effects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryFlags {
    /// Stock was committed (decremented) for a confirmed payment.
    pub inventory_updated: bool,

    /// A reservation was released back to available stock.
    pub inventory_released: bool,

    /// Stock was reserved at checkout.
    #[serde(default)]
    pub inventory_reserved: bool,
}
