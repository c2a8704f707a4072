//! Token agent
//!
//! Thin supervising daemon around one credential store:
//! 1. Loads TOML configuration (`[oauth]` endpoints + `[store]` settings)
//! 2. Starts a registry with a single file-backed store
//! 3. Keeps the credential fresh until ctrl-c (or until the store dies),
//!    then stops the store so the terminate hook persists final state

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use credential_store::{FileHooks, StoreOptions, StoreRegistry};
use oauth_client::HttpAuthOps;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AgentConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting token-agent");

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = AgentConfig::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = AgentConfig::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        store = %config.store.name,
        token_url = %config.oauth.token_url,
        credentials_dir = %config.store.credentials_dir.display(),
        "configuration loaded"
    );

    let ops = HttpAuthOps::from_config(&config.oauth).context("building auth client")?;

    let mut options = StoreOptions::new(config.store.name.clone(), Arc::new(ops))
        .hooks(Arc::new(FileHooks::new(&config.store.credentials_dir)))
        .validate_interval(Duration::from_secs(config.store.validate_interval_secs))
        .refresh_margin(Duration::from_secs(config.store.refresh_margin_secs));
    if let Some(refresh_token) = config.store.seed_refresh_token.clone() {
        options = options.seed(config.oauth.seed_credential(Some(refresh_token)));
    }

    let registry = StoreRegistry::new();
    let handle = registry
        .start(options)
        .await
        .context("starting credential store")?;
    info!(store = handle.name(), "credential store running");

    // Run until either a shutdown signal arrives or the store dies on its
    // own (e.g. an unrecoverable refresh failure terminates the actor)
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for shutdown signal")?;
            info!("shutting down");
        }
        _ = handle.closed() => {
            error!(store = handle.name(), "credential store terminated unexpectedly");
            anyhow::bail!("credential store terminated unexpectedly");
        }
    }

    // The reaper may have already pruned the entry if the actor exited
    // between the signal and this call
    match registry.stop(&config.store.name).await {
        Ok(()) | Err(credential_store::Error::NotFound(_)) => Ok(()),
        Err(e) => Err(e).context("stopping credential store"),
    }
}
