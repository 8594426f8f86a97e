//! Liveness/readiness probe.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::routes::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub file_rules: usize,
    pub registered_rules: usize,
}

/// GET /health — server version plus a glimpse of the loaded config.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        file_rules: state.rules.files.len(),
        registered_rules: state.registry.len(),
    })
}
