//! Order and booking read and staff transition endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use document_store::DocumentStore;
use domain::{Booking, BookingStatus, Order, OrderStatus};
use reconciliation::{Advanced, InventoryOutcome};
use serde::{Deserialize, Serialize};

use super::parse_entity_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct StatusChangeRequest {
    pub status: String,
    pub actor: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Serialize)]
pub struct StatusChangeResponse<P> {
    pub record: P,
    pub inventory_released: bool,
    pub inventory_committed: bool,
    pub reversals: Vec<String>,
}

impl<P> From<Advanced<P>> for StatusChangeResponse<P> {
    fn from(advanced: Advanced<P>) -> Self {
        Self {
            inventory_released: matches!(
                advanced.inventory,
                Some(InventoryOutcome::Applied { .. })
            ),
            inventory_committed: matches!(
                advanced.committed,
                Some(InventoryOutcome::Applied { .. })
            ),
            reversals: advanced.reversals.iter().map(ToString::to_string).collect(),
            record: advanced.record,
        }
    }
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get_order<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order = state.fulfillment.get_order(parse_entity_id(&id)?).await?;
    Ok(Json(order))
}

/// POST /orders/{id}/status: staff transition.
#[tracing::instrument(skip(state, req), fields(to = %req.status, actor = %req.actor))]
pub async fn advance_order<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<StatusChangeResponse<Order>>, ApiError> {
    let id = parse_entity_id(&id)?;
    let status = OrderStatus::parse(&req.status)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown order status {}", req.status)))?;
    let advanced = state
        .fulfillment
        .advance_order(id, status, &req.actor, req.reason)
        .await?;
    Ok(Json(advanced.into()))
}

/// GET /bookings/{id}
#[tracing::instrument(skip(state))]
pub async fn get_booking<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Booking>, ApiError> {
    let booking = state.fulfillment.get_booking(parse_entity_id(&id)?).await?;
    Ok(Json(booking))
}

/// POST /bookings/{id}/status: staff transition.
#[tracing::instrument(skip(state, req), fields(to = %req.status, actor = %req.actor))]
pub async fn advance_booking<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<StatusChangeResponse<Booking>>, ApiError> {
    let id = parse_entity_id(&id)?;
    let status = BookingStatus::parse(&req.status)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown booking status {}", req.status)))?;
    let advanced = state
        .fulfillment
        .advance_booking(id, status, &req.actor, req.reason)
        .await?;
    Ok(Json(advanced.into()))
}
