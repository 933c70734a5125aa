//! Reconciliation error types.

use common::EntityId;
use document_store::StoreError;
use domain::{DomainError, InventoryError, TransitionError};
use thiserror::Error;

/// Errors raised by the payment gateway adapter.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The HTTP request could not be completed.
    #[error("Gateway request failed: {0}")]
    RequestFailed(String),

    /// The gateway answered with an error status.
    #[error("Gateway rejected the request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The gateway answered with a body we could not interpret.
    #[error("Malformed gateway response: {0}")]
    Malformed(String),
}

/// Errors raised by a mail transport.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Mail transport failed: {0}")]
    Transport(String),

    #[error("Mail transport rejected the message (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Errors that can occur during checkout, reconciliation and fulfillment.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A domain rule or the store rejected the operation.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// The payment gateway failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Input failed validation.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// No payment session exists for the reference.
    #[error("Payment session not found: {0}")]
    SessionNotFound(String),

    /// Stock cannot be committed for a record that has not been paid.
    #[error("{kind} {id} is not paid")]
    NotPaid { kind: &'static str, id: String },

    /// The ledger entry was already reversed.
    #[error("Ledger entry {0} was already reversed")]
    AlreadyReversed(EntityId),

    /// A reversal entry cannot itself be reversed.
    #[error("Ledger entry {0} is a reversal and cannot be reversed")]
    ReversalOfReversal(EntityId),
}

impl From<StoreError> for ReconcileError {
    fn from(err: StoreError) -> Self {
        ReconcileError::Domain(DomainError::Store(err))
    }
}

impl From<TransitionError> for ReconcileError {
    fn from(err: TransitionError) -> Self {
        ReconcileError::Domain(DomainError::Transition(err))
    }
}

impl From<InventoryError> for ReconcileError {
    fn from(err: InventoryError) -> Self {
        ReconcileError::Domain(DomainError::Inventory(err))
    }
}

impl ReconcileError {
    /// Returns true for store failures, as opposed to rejected input.
    pub fn is_persistence(&self) -> bool {
        matches!(self, ReconcileError::Domain(err) if err.is_persistence())
    }

    /// Returns true if the store reported a lost optimistic-concurrency race.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, ReconcileError::Domain(err) if err.is_concurrency_conflict())
    }
}

/// Convenience type alias for reconciliation results.
pub type Result<T> = std::result::Result<T, ReconcileError>;
