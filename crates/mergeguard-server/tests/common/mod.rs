use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, header};
use http_body_util::BodyExt;
use serde_json::Value;

use mergeguard_core::RuleConfig;
use mergeguard_server::config::ServerConfig;
use mergeguard_server::gitlab::GitLabClient;
use mergeguard_server::routes::{AppState, build_router};

pub const TEST_WEBHOOK_SECRET: &str = "test-webhook-secret";

const TEST_RULES: &str = "\
files:
  - name: product
    path: '**/'
    filename: product.{yaml,yml}
    parser_type: yaml
    default_action: manual_review
    sections:
      - name: warehouses
        yaml_path: warehouses
        rule_configs:
          - name: size_change_rule
";

/// Build a test app with the built-in rules and a dummy GitLab endpoint.
/// Nothing in these tests reaches the network: accepted webhooks spawn
/// background tasks whose fetches fail fast against the unroutable URL.
pub fn test_app() -> Router {
    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        gitlab_url: "http://127.0.0.1:1".into(),
        gitlab_token: "test-token".into(),
        webhook_secret: TEST_WEBHOOK_SECRET.into(),
        rules_path: PathBuf::from("unused.yaml"),
        eval_timeout: Duration::from_secs(1),
        dry_run: true,
    };

    let rules = RuleConfig::from_yaml_str(TEST_RULES).expect("test rules parse");
    let registry = mergeguard_rules::defaults();
    rules.validate(&registry).expect("test rules validate");
    let client = GitLabClient::new(&config.gitlab_url, config.gitlab_token.clone())
        .expect("test client");

    build_router(Arc::new(AppState {
        config,
        rules,
        registry,
        client,
    }))
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

pub fn post_webhook(path: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header("X-Gitlab-Token", token);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
