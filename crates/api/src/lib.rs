//! HTTP API server for the inventory reservation ledger.
//!
//! Exposes batch reserve, batch complete, availability reads, and the
//! expiry sweep over REST, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::BatchCoordinator;
use engine::{ExpirySweeper, ReservationEngine};
use ledger::StockLedger;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::reservations::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<L: StockLedger + Clone + 'static>(
    state: Arc<AppState<L>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/reservations", post(routes::reservations::reserve::<L>))
        .route(
            "/reservations/complete",
            post(routes::reservations::complete::<L>),
        )
        .route("/reservations/{id}", get(routes::reservations::get::<L>))
        .route(
            "/stock",
            get(routes::stock::available::<L>).put(routes::stock::sync::<L>),
        )
        .route("/cleanup", post(routes::reservations::cleanup::<L>))
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

/// Creates application state over the given ledger.
pub fn create_state<L: StockLedger + Clone + 'static>(
    ledger: L,
    config: Config,
) -> Arc<AppState<L>> {
    let engine = ReservationEngine::new(ledger.clone());
    let coordinator = BatchCoordinator::new(engine.clone());
    let sweeper = ExpirySweeper::new(engine.clone());

    Arc::new(AppState {
        engine,
        coordinator,
        sweeper,
        ledger,
        config,
    })
}
