//! HTTP API for the allocation service.
//!
//! Commands are posted as JSON and dispatched through the message bus;
//! allocations are queried from the read model. Structured logging uses
//! `tracing` and metrics are exposed in Prometheus format.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use projections::AllocationsView;
use service_layer::{AllocationConfig, Bootstrap};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::allocations::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/add_batch", post(routes::allocations::add_batch))
        .route("/allocate", post(routes::allocations::allocate))
        .route(
            "/change_batch_quantity",
            post(routes::allocations::change_batch_quantity),
        )
        .route("/allocations/{orderid}", get(routes::allocations::list))
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

/// Creates application state with production collaborators.
pub fn create_default_state(config: AllocationConfig) -> Arc<AppState> {
    create_state(Bootstrap::new(config))
}

/// Creates application state from a customised bootstrap.
///
/// The bootstrap's allocations view is replaced by one shared with the
/// query endpoint.
pub fn create_state(bootstrap: Bootstrap) -> Arc<AppState> {
    let allocations = AllocationsView::new();
    let bus = bootstrap.with_allocations_view(allocations.clone()).build();
    Arc::new(AppState {
        bus: Mutex::new(bus),
        allocations,
    })
}
