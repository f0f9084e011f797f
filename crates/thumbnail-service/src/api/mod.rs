pub mod routes;

use axum::{middleware, routing::get, Router};

use crate::state::AppState;
use routes::*;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/generate-thumbnail", get(generate_thumbnail))
        .layer(middleware::from_fn(telemetry::trace_http_request))
        .with_state(state)
}
