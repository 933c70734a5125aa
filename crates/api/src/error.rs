//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use document_store::StoreError;
use domain::{DomainError, InventoryError};
use reconciliation::ReconcileError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The caller failed authentication.
    Unauthorized(String),
    /// Checkout, reconciliation or fulfillment error.
    Reconcile(ReconcileError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Reconcile(err) => reconcile_error_to_response(err),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %message, "request failed");
        }
        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn reconcile_error_to_response(err: ReconcileError) -> (StatusCode, String) {
    let status = match &err {
        ReconcileError::Domain(domain_err) => domain_status(domain_err),
        ReconcileError::Gateway(_) => StatusCode::BAD_GATEWAY,
        ReconcileError::Validation(_) => StatusCode::BAD_REQUEST,
        ReconcileError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        ReconcileError::NotPaid { .. }
        | ReconcileError::AlreadyReversed(_)
        | ReconcileError::ReversalOfReversal(_) => StatusCode::CONFLICT,
    };
    (status, err.to_string())
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Transition(_) => StatusCode::CONFLICT,
        DomainError::Inventory(InventoryError::InsufficientStock { .. }) => StatusCode::CONFLICT,
        DomainError::Inventory(InventoryError::UnknownProduct(_)) => StatusCode::BAD_REQUEST,
        DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
        DomainError::Invalid(_) => StatusCode::BAD_REQUEST,
        DomainError::Store(StoreError::ConcurrencyConflict { .. })
        | DomainError::Store(StoreError::DuplicateDocument { .. }) => StatusCode::CONFLICT,
        DomainError::Store(_) | DomainError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        ApiError::Reconcile(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Reconcile(ReconcileError::Domain(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::TransitionError;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(
            status_of(ApiError::from(DomainError::Transition(
                TransitionError::Unchanged { status: "paid" }
            ))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ApiError::from(DomainError::Invalid("bad".into()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::from(DomainError::NotFound {
                collection: "orders",
                id: "x".into()
            })),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ApiError::Reconcile(ReconcileError::Gateway(
                reconciliation::GatewayError::RequestFailed("timeout".into())
            ))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(ApiError::Reconcile(ReconcileError::SessionNotFound(
                "ORD-x".into()
            ))),
            StatusCode::NOT_FOUND
        );
    }
}
