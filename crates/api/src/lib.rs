//! HTTP API server for the storefront payment flow.
//!
//! Exposes checkout, the two reconciliation triggers (polling verification
//! and the gateway webhook), staff fulfillment and ledger endpoints, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use document_store::DocumentStore;
use metrics_exporter_prometheus::PrometheusHandle;
use reconciliation::{
    CheckoutService, FulfillmentService, LedgerPoster, Mailer, PaymentGateway, ReconcileSettings,
    Reconciler,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Payment gateway shared by checkout and reconciliation.
pub type SharedGateway = Arc<dyn PaymentGateway>;

/// Mail transport used for customer notifications.
pub type SharedMailer = Arc<dyn Mailer>;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub store: S,
    pub checkout: CheckoutService<S, SharedGateway>,
    pub reconciler: Reconciler<S, SharedGateway, SharedMailer>,
    pub fulfillment: FulfillmentService<S>,
    pub ledger: LedgerPoster<S>,
    pub settings: ReconcileSettings,
    pub webhook_secret_hash: Option<String>,
}

impl<S: DocumentStore + Clone> AppState<S> {
    /// Wires the services over one store, gateway and mailer.
    pub fn new(store: S, gateway: SharedGateway, mailer: SharedMailer, config: &Config) -> Self {
        Self {
            checkout: CheckoutService::new(store.clone(), gateway.clone())
                .with_pricing(config.pricing),
            reconciler: Reconciler::new(store.clone(), gateway, mailer),
            fulfillment: FulfillmentService::new(store.clone()),
            ledger: LedgerPoster::new(store.clone()),
            settings: config.reconcile_settings(),
            webhook_secret_hash: config.webhook_secret_hash.clone(),
            store,
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/products", post(routes::products::create::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
        .route("/checkout/orders", post(routes::checkout::order::<S>))
        .route("/checkout/bookings", post(routes::checkout::booking::<S>))
        .route("/payments/verify", get(routes::payments::verify::<S>))
        .route("/webhooks/payments", post(routes::payments::webhook::<S>))
        .route("/orders/{id}", get(routes::purchases::get_order::<S>))
        .route(
            "/orders/{id}/status",
            post(routes::purchases::advance_order::<S>),
        )
        .route("/bookings/{id}", get(routes::purchases::get_booking::<S>))
        .route(
            "/bookings/{id}/status",
            post(routes::purchases::advance_booking::<S>),
        )
        .route(
            "/ledger",
            get(routes::ledger::list::<S>).post(routes::ledger::create::<S>),
        )
        .route("/ledger/{id}/reverse", post(routes::ledger::reverse::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
