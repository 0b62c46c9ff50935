use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

pub(super) fn new() -> Router {
    Router::new()
        .route("/healthcheck", get(health_check))
        .layer(TraceLayer::new_for_http())
}

#[allow(clippy::unused_async)]
async fn health_check() -> impl IntoResponse {
    Json(json!({"ok":"healthy"}))
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod routes_tests;
