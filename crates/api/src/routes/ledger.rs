//! Ledger listing, manual posting and reversal endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::CorrelationRef;
use document_store::DocumentStore;
use domain::{Currency, LedgerEntry, LedgerEntryType, Money, NewLedgerEntry};
use reconciliation::{LedgerFilter, PostResult};
use serde::{Deserialize, Serialize};

use super::parse_entity_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct LedgerQuery {
    pub order_id: Option<String>,
    pub booking_id: Option<String>,
    pub payment_ref: Option<String>,
    pub limit: Option<usize>,
}

impl LedgerQuery {
    fn into_filter(self) -> Result<LedgerFilter, ApiError> {
        Ok(LedgerFilter {
            order_id: self.order_id.as_deref().map(parse_entity_id).transpose()?,
            booking_id: self.booking_id.as_deref().map(parse_entity_id).transpose()?,
            payment_ref: self
                .payment_ref
                .as_deref()
                .map(CorrelationRef::parse)
                .transpose()
                .map_err(|e| ApiError::BadRequest(e.to_string()))?,
            limit: self.limit,
        })
    }
}

/// GET /ledger: list entries, filtered by order, booking or payment reference.
#[tracing::instrument(skip(state, query))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    let entries = state.ledger.entries(query.into_filter()?).await?;
    Ok(Json(entries))
}

#[derive(Deserialize)]
pub struct ManualEntryRequest {
    pub entry_type: LedgerEntryType,
    pub amount: Money,
    pub currency: Currency,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub booking_id: Option<String>,
    #[serde(default)]
    pub payment_ref: Option<String>,
    pub description: String,
    pub actor: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Serialize)]
pub struct ManualEntryResponse {
    pub id: String,
    pub created: bool,
}

/// POST /ledger: record an entry by hand.
#[tracing::instrument(skip(state, req), fields(entry_type = %req.entry_type, actor = %req.actor))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ManualEntryRequest>,
) -> Result<(StatusCode, Json<ManualEntryResponse>), ApiError> {
    if req.actor.trim().is_empty() {
        return Err(ApiError::BadRequest("actor is required".to_string()));
    }
    let draft = NewLedgerEntry {
        entry_type: req.entry_type,
        amount: req.amount,
        currency: req.currency,
        order_id: req.order_id.as_deref().map(parse_entity_id).transpose()?,
        booking_id: req.booking_id.as_deref().map(parse_entity_id).transpose()?,
        payment_ref: req
            .payment_ref
            .as_deref()
            .map(CorrelationRef::parse)
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        description: req.description,
        actor: req.actor,
    };

    let posted = state
        .ledger
        .post_manual(draft, req.idempotency_key.as_deref())
        .await?;
    let status = match posted {
        PostResult::Created(_) => StatusCode::CREATED,
        PostResult::Existing(_) => StatusCode::OK,
    };
    Ok((
        status,
        Json(ManualEntryResponse {
            id: posted.id().to_string(),
            created: posted.is_created(),
        }),
    ))
}

#[derive(Deserialize)]
pub struct ReverseRequest {
    pub reason: String,
    pub actor: String,
}

/// POST /ledger/{id}/reverse: post the reversal of an entry.
#[tracing::instrument(skip(state, req), fields(actor = %req.actor))]
pub async fn reverse<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<ReverseRequest>,
) -> Result<(StatusCode, Json<LedgerEntry>), ApiError> {
    if req.actor.trim().is_empty() || req.reason.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "reason and actor are required".to_string(),
        ));
    }
    let reversal_id = state
        .ledger
        .reverse(parse_entity_id(&id)?, &req.reason, &req.actor)
        .await?;
    let reversal = state
        .ledger
        .get(reversal_id)
        .await?
        .ok_or_else(|| ApiError::Internal("reversal missing after posting".to_string()))?;
    Ok((StatusCode::CREATED, Json(reversal)))
}
