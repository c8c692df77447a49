pub mod track;
pub mod webhooks;

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// All routes. Takes the state because the tracking routes build their auth
/// layer from it.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        // Webhook endpoints (provider signature auth)
        .merge(webhooks::router())
        // Tracking API (bearer key auth)
        .merge(track::router(state))
}
