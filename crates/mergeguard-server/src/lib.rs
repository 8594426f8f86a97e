//! # mergeguard-server
//!
//! Webhook host around the `mergeguard-core` engine: receives GitLab
//! merge-request events, evaluates them against the loaded rules document,
//! and applies the decision (approve, or reset approval plus a summary
//! comment) through the GitLab API.

pub mod config;
pub mod error;
pub mod gitlab;
pub mod routes;

pub use config::ServerConfig;
pub use gitlab::GitLabClient;
pub use routes::{AppState, build_router};
