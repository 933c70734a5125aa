//! Reconciliation triggers: the redirect poll and the gateway webhook.
//!
//! Both call the same `reconcile`; it is safe for them to race.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use common::CorrelationRef;
use document_store::DocumentStore;
use reconciliation::{ReconcileError, ReconcileReport};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AppState;
use crate::error::ApiError;

/// Header the gateway signs webhook deliveries with.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "verif-hash";

#[derive(Deserialize)]
pub struct VerifyQuery {
    #[serde(alias = "txRef")]
    pub tx_ref: Option<String>,
}

/// GET /payments/verify?tx_ref=...: reconcile and report the result to the browser.
#[tracing::instrument(skip(state, query))]
pub async fn verify<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<ReconcileReport>, ApiError> {
    let raw = query
        .tx_ref
        .ok_or_else(|| ApiError::BadRequest("tx_ref is required".to_string()))?;
    let reference = CorrelationRef::parse(&raw).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let report = state
        .reconciler
        .reconcile(&reference, &state.settings)
        .await?;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ReconcileReport>,
}

impl WebhookAck {
    fn ignored() -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                status: "ignored",
                report: None,
            }),
        )
    }
}

/// POST /webhooks/payments: reconcile on the gateway's push.
///
/// Unauthenticated deliveries are rejected with 401. Deliveries that can
/// never be processed (webhooks disabled, no usable reference, unknown
/// session) are acknowledged with 200. A reconciliation that errors or
/// leaves a step failed answers 503 so the gateway redelivers and the
/// remaining steps run again.
#[tracing::instrument(skip_all)]
pub async fn webhook<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<WebhookAck>), ApiError> {
    let Some(expected) = state.webhook_secret_hash.as_deref() else {
        tracing::warn!("webhook received but no secret hash is configured");
        return Err(ApiError::Unauthorized("webhook secret not configured".to_string()));
    };
    let provided = headers
        .get(WEBHOOK_SIGNATURE_HEADER)
        .map(|value| value.as_bytes())
        .unwrap_or_default();
    if !constant_time_eq::constant_time_eq(provided, expected.as_bytes()) {
        tracing::warn!("webhook signature mismatch");
        return Err(ApiError::Unauthorized("invalid webhook signature".to_string()));
    }

    if !state.settings.webhooks_enabled {
        tracing::info!("webhooks disabled, delivery ignored");
        return Ok(WebhookAck::ignored());
    }

    let Some(reference) = reference_from_payload(&body) else {
        tracing::warn!("webhook payload carries no usable transaction reference");
        return Ok(WebhookAck::ignored());
    };

    match state.reconciler.reconcile(&reference, &state.settings).await {
        Ok(report) if report.is_complete() => Ok((
            StatusCode::OK,
            Json(WebhookAck {
                status: "processed",
                report: Some(report),
            }),
        )),
        Ok(report) => {
            tracing::warn!(
                correlation_ref = %reference,
                "webhook reconciliation incomplete, asking for redelivery"
            );
            Ok((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(WebhookAck {
                    status: "incomplete",
                    report: Some(report),
                }),
            ))
        }
        Err(ReconcileError::SessionNotFound(_)) => {
            tracing::warn!(correlation_ref = %reference, "webhook for unknown payment session");
            Ok(WebhookAck::ignored())
        }
        Err(e) => {
            tracing::error!(correlation_ref = %reference, error = %e, "webhook reconciliation failed");
            Ok((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(WebhookAck {
                    status: "error",
                    report: None,
                }),
            ))
        }
    }
}

/// Finds the transaction reference in a webhook body.
///
/// Gateways put it either at the top level or under `data`, spelled
/// `tx_ref` or `txRef`.
fn reference_from_payload(body: &[u8]) -> Option<CorrelationRef> {
    let payload: Value = serde_json::from_slice(body).ok()?;
    let lookup = |value: &Value| {
        ["tx_ref", "txRef"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
    };
    let raw = payload
        .get("data")
        .and_then(lookup)
        .or_else(|| lookup(&payload))?;
    CorrelationRef::parse(&raw).ok()
}
