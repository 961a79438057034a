//! HTTP API for the checkout and payment-reconciliation engine.
//!
//! Exposes checkout, the payment-notification webhook and the administrative
//! order operations over axum, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use checkout::{CheckoutService, ReconciliationHandler};
use metrics_exporter_prometheus::PrometheusHandle;
use payments::PaymentGateway;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, G>(state: Arc<AppState<S, G>>, metrics_handle: PrometheusHandle) -> Router
where
    S: Store + 'static,
    G: PaymentGateway + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/checkout", post(routes::checkout::checkout::<S, G>))
        .route("/payment/webhook", post(routes::webhook::receive::<S, G>))
        .route("/orders/{id}", get(routes::orders::get::<S, G>))
        .route("/orders/{id}/lines", get(routes::orders::lines::<S, G>))
        .route("/orders/{id}/status", put(routes::orders::set_status::<S, G>))
        .route("/orders/{id}/refund", post(routes::orders::refund::<S, G>))
        .route(
            "/orders/{id}/authorize",
            post(routes::orders::authorize::<S, G>),
        )
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

/// Builds the shared application state from a store and a gateway.
pub fn create_state<S, G>(store: S, gateway: G, currency: &str) -> Arc<AppState<S, G>>
where
    S: Store + Clone,
    G: PaymentGateway + Clone,
{
    Arc::new(AppState {
        service: CheckoutService::new(store.clone(), gateway.clone(), currency),
        handler: ReconciliationHandler::new(store.clone(), gateway),
        store,
    })
}
