//! HTTP surface: webhook intake and health probe.

pub mod health;
pub mod webhook;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use mergeguard_core::{RuleConfig, RuleRegistry};

use crate::config::ServerConfig;
use crate::gitlab::GitLabClient;

/// Shared, read-only application state. Built once at startup; every
/// webhook delivery sees the same configuration and registry.
pub struct AppState {
    pub config: ServerConfig,
    pub rules: RuleConfig,
    pub registry: RuleRegistry,
    pub client: GitLabClient,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/webhook", post(webhook::receive_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
