//! HTTP routes of the API.
//!
//! Request tracing is enabled via middleware that generates a unique request ID
//! for each incoming request. API responses are never cached.

pub mod health;
pub mod system;

use axum::{middleware, routing::get, Router};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::middleware::request_id_layer;
use crate::state::AppState;

/// Creates the Axum router for the API.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new().route("/api/system", get(system::information));

    // Health check for liveness probes
    let health_routes = Router::new().route("/health", get(health::health));

    Router::new()
        .merge(api_routes)
        .merge(health_routes)
        .with_state(state)
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(middleware::from_fn(request_id_layer))
}
