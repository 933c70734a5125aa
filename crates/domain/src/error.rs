//! Domain error types.

use document_store::StoreError;
use thiserror::Error;

use crate::lifecycle::TransitionError;
use crate::product::InventoryError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the document store.
    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    /// A requested status transition was rejected.
    #[error("Invalid transition: {0}")]
    Transition(#[from] TransitionError),

    /// A stock adjustment was rejected.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Entity not found.
    #[error("Not found: {collection} with id {id}")]
    NotFound {
        collection: &'static str,
        id: String,
    },

    /// Input failed validation.
    #[error("Invalid input: {0}")]
    Invalid(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Returns true if a re-read and retry could resolve the error.
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, DomainError::Store(StoreError::ConcurrencyConflict { .. }))
    }

    /// Returns true if the error is a store failure rather than a business rule.
    pub fn is_persistence(&self) -> bool {
        matches!(self, DomainError::Store(_) | DomainError::Serialization(_))
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
