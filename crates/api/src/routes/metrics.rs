//! Prometheus metrics endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers descriptions for the metrics the reconciliation engine emits.
pub fn describe() {
    describe_counter!("reconcile_total", "Reconciliation calls started");
    describe_histogram!(
        "reconcile_duration_seconds",
        Unit::Seconds,
        "Time spent in one reconciliation call"
    );
    describe_counter!(
        "reconcile_step_failures_total",
        "Reconciliation steps that failed, by step"
    );
    describe_counter!(
        "inventory_commits_total",
        "Orders and bookings whose stock was committed"
    );
    describe_counter!(
        "ledger_entries_posted_total",
        "Ledger entries inserted, by entry type"
    );
    describe_counter!(
        "notifications_sent_total",
        "Payment emails handed to the mail transport, by outcome"
    );
    describe_counter!("notifications_failed_total", "Payment emails that failed to send");
    describe_counter!("document_store_batches_total", "Write batches applied by the store");
}

/// GET /metrics: Prometheus text exposition.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        handle.render(),
    )
}
