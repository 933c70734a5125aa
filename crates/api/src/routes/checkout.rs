//! Checkout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use document_store::DocumentStore;
use reconciliation::{BookingCheckout, CheckoutReceipt, OrderCheckout};

use crate::AppState;
use crate::error::ApiError;

/// POST /checkout/orders: create an order, reserve stock and open a hosted checkout.
#[tracing::instrument(skip(state, req), fields(customer = %req.customer.email))]
pub async fn order<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<OrderCheckout>,
) -> Result<(StatusCode, Json<CheckoutReceipt>), ApiError> {
    let receipt = state.checkout.checkout_order(req).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST /checkout/bookings: create a booking and open a hosted checkout.
#[tracing::instrument(skip(state, req), fields(customer = %req.customer.email))]
pub async fn booking<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<BookingCheckout>,
) -> Result<(StatusCode, Json<CheckoutReceipt>), ApiError> {
    let receipt = state.checkout.checkout_booking(req).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
