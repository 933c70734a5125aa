//! Payment sessions created at checkout and settled by reconciliation.

use chrono::{DateTime, Duration, Utc};
use common::{CorrelationRef, EntityId};
use document_store::Version;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, collections};
use crate::money::{Currency, Money};
use crate::order::Customer;
use crate::purchase::PurchaseKind;

/// Verified status of a payment session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The one order or booking a payment session pays for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum PaymentTarget {
    Order(EntityId),
    Booking(EntityId),
}

impl PaymentTarget {
    pub fn kind(&self) -> PurchaseKind {
        match self {
            PaymentTarget::Order(_) => PurchaseKind::Order,
            PaymentTarget::Booking(_) => PurchaseKind::Booking,
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            PaymentTarget::Order(id) | PaymentTarget::Booking(id) => *id,
        }
    }
}

/// Which customer email a session guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    PaymentSuccess,
    PaymentFailure,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PaymentSuccess => "payment_success",
            NotificationKind::PaymentFailure => "payment_failure",
        }
    }
}

/// Per-email idempotency state: a sent flag plus an in-flight claim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailGuard {
    pub sent: bool,

    /// Set while a sender is working on this email.
    #[serde(default)]
    pub claimed_at: Option<DateTime<Utc>>,
}

impl EmailGuard {
    fn is_claimed(&self, now: DateTime<Utc>, lease: Duration) -> bool {
        self.claimed_at.is_some_and(|at| now - at < lease)
    }
}

/// A payment attempt keyed by its caller-generated correlation reference.
///
/// Amount and currency are fixed at creation. Status moves from `pending`
/// to a terminal value at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSession {
    transaction_ref: CorrelationRef,

    #[serde(skip)]
    version: Version,

    target: PaymentTarget,
    status: PaymentStatus,
    amount: Money,
    currency: Currency,
    customer: Customer,

    #[serde(default)]
    gateway_transaction_id: Option<String>,

    #[serde(default)]
    payment_method: Option<String>,

    #[serde(default)]
    success_email: EmailGuard,

    #[serde(default)]
    failure_email: EmailGuard,

    created_at: DateTime<Utc>,

    #[serde(default)]
    verified_at: Option<DateTime<Utc>>,
}

impl PaymentSession {
    /// Creates a pending session.
    pub fn new(
        transaction_ref: CorrelationRef,
        target: PaymentTarget,
        amount: Money,
        currency: Currency,
        customer: Customer,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_ref,
            version: Version::initial(),
            target,
            status: PaymentStatus::Pending,
            amount,
            currency,
            customer,
            gateway_transaction_id: None,
            payment_method: None,
            success_email: EmailGuard::default(),
            failure_email: EmailGuard::default(),
            created_at: at,
            verified_at: None,
        }
    }

    pub fn transaction_ref(&self) -> &CorrelationRef {
        &self.transaction_ref
    }

    pub fn target(&self) -> PaymentTarget {
        self.target
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    pub fn gateway_transaction_id(&self) -> Option<&str> {
        self.gateway_transaction_id.as_deref()
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment_method.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn verified_at(&self) -> Option<DateTime<Utc>> {
        self.verified_at
    }

    /// Records a verified terminal status.
    ///
    /// Returns false (and changes nothing) if the session is already terminal
    /// or `status` is `pending`.
    pub fn record_outcome(
        &mut self,
        status: PaymentStatus,
        gateway_transaction_id: Option<String>,
        payment_method: Option<String>,
        at: DateTime<Utc>,
    ) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.gateway_transaction_id = gateway_transaction_id.or(self.gateway_transaction_id.take());
        self.payment_method = payment_method.or(self.payment_method.take());
        self.verified_at = Some(at);
        true
    }

    fn guard(&self, kind: NotificationKind) -> &EmailGuard {
        match kind {
            NotificationKind::PaymentSuccess => &self.success_email,
            NotificationKind::PaymentFailure => &self.failure_email,
        }
    }

    fn guard_mut(&mut self, kind: NotificationKind) -> &mut EmailGuard {
        match kind {
            NotificationKind::PaymentSuccess => &mut self.success_email,
            NotificationKind::PaymentFailure => &mut self.failure_email,
        }
    }

    /// Returns true once the email has been delivered to the transport.
    pub fn email_sent(&self, kind: NotificationKind) -> bool {
        self.guard(kind).sent
    }

    /// Claims the right to send an email.
    ///
    /// Fails if the email was already sent or another sender holds a claim
    /// younger than `lease`. A claim older than `lease` is treated as
    /// abandoned and can be taken over.
    pub fn try_claim(&mut self, kind: NotificationKind, now: DateTime<Utc>, lease: Duration) -> bool {
        let guard = self.guard_mut(kind);
        if guard.sent || guard.is_claimed(now, lease) {
            return false;
        }
        guard.claimed_at = Some(now);
        true
    }

    /// Marks the email delivered and drops the claim.
    pub fn mark_sent(&mut self, kind: NotificationKind) {
        let guard = self.guard_mut(kind);
        guard.sent = true;
        guard.claimed_at = None;
    }

    /// Drops a claim after a failed send so a later attempt can retry.
    pub fn release_claim(&mut self, kind: NotificationKind) {
        self.guard_mut(kind).claimed_at = None;
    }
}

impl Entity for PaymentSession {
    const COLLECTION: &'static str = collections::PAYMENT_SESSIONS;

    fn document_id(&self) -> String {
        self.transaction_ref.to_string()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }
}
