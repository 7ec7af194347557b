// src/api.rs
//! Liveness surface for hosting platforms that expect an HTTP port.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tower_http::cors::CorsLayer;

use crate::scheduler::{RelayStatus, SharedStatus};

#[derive(Clone)]
pub struct AppState {
    pub status: SharedStatus,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/status", get(status))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Result<Json<RelayStatus>, StatusCode> {
    state
        .status
        .read()
        .map(|s| Json(s.clone()))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
