//! Process configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

/// Server configuration loaded from `MERGEGUARD_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the GitLab instance, e.g. `https://gitlab.example.com`.
    pub gitlab_url: String,
    /// API token of the bot identity used to fetch, comment, and approve.
    pub gitlab_token: String,
    /// Shared secret checked against `X-Gitlab-Token`; empty disables the
    /// check (local development only).
    pub webhook_secret: String,
    /// Path to the rules document.
    pub rules_path: PathBuf,
    /// Upper bound for one MR evaluation, fetches included.
    pub eval_timeout: Duration,
    /// Log decisions without approving or commenting upstream.
    pub dry_run: bool,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("MERGEGUARD_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("MERGEGUARD_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            gitlab_url: std::env::var("MERGEGUARD_GITLAB_URL")
                .unwrap_or_else(|_| "https://gitlab.com".into()),
            gitlab_token: std::env::var("MERGEGUARD_GITLAB_TOKEN").unwrap_or_default(),
            webhook_secret: std::env::var("MERGEGUARD_WEBHOOK_SECRET").unwrap_or_default(),
            rules_path: std::env::var("MERGEGUARD_RULES_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("rules.yaml")),
            eval_timeout: std::env::var("MERGEGUARD_EVAL_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or_else(|| Duration::from_secs(60)),
            dry_run: std::env::var("MERGEGUARD_DRY_RUN")
                .map(|v| v != "0" && v.to_lowercase() != "false")
                .unwrap_or(false),
        }
    }
}
