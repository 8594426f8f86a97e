use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use mergeguard_core::RuleConfig;
use mergeguard_server::routes::{AppState, build_router};
use mergeguard_server::{GitLabClient, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "mergeguard-server", version, about = "Merge-request auto-review webhook")]
struct Args {
    /// Path to the rules document (overrides MERGEGUARD_RULES_PATH).
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Bind address as host:port (overrides MERGEGUARD_HOST/PORT).
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = ServerConfig::from_env();
    if let Some(rules) = args.rules {
        config.rules_path = rules;
    }
    if let Some(bind) = &args.bind {
        let (host, port) = bind
            .rsplit_once(':')
            .context("--bind must be host:port")?;
        config.host = host.to_string();
        config.port = port.parse().context("--bind port must be numeric")?;
    }

    tracing::info!(
        "starting mergeguard-server v{} on {}:{}",
        env!("CARGO_PKG_VERSION"),
        config.host,
        config.port
    );

    let rules = RuleConfig::load(&config.rules_path)
        .with_context(|| format!("loading rules from {}", config.rules_path.display()))?;
    let registry = mergeguard_rules::defaults();

    // Configuration errors are fatal: serving with a config the engine
    // cannot honour would silently weaken review.
    rules
        .validate(&registry)
        .context("rules document failed validation")?;
    tracing::info!(
        file_rules = rules.files.len(),
        registered_rules = registry.len(),
        dry_run = config.dry_run,
        "rules loaded"
    );

    let client = GitLabClient::new(&config.gitlab_url, config.gitlab_token.clone())
        .context("building GitLab client")?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid bind address")?;

    let state = Arc::new(AppState {
        config,
        rules,
        registry,
        client,
    });
    let app = build_router(state);

    tracing::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind")?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
