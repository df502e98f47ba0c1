mod config;
mod error;
mod mock;
mod parser;
mod present;
mod providers;
mod search;
mod server;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tracing::info;
use tracing_subscriber::EnvFilter;

use deal_common::redis::RedisKv;
use deal_common::settings::{FileSettingsStore, RedisSettingsStore, SettingsStore};

use config::Config;
use server::DealFinderServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries MCP JSON-RPC, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting deal-finder MCP server");

    let config = Config::from_env()?;
    info!(
        settings_path = %config.settings_path.display(),
        redis = config.redis_url.is_some(),
        timeout_ms = config.providers.timeout.as_millis(),
        max_retries = config.providers.max_retries,
        "configuration loaded"
    );

    let store: Arc<dyn SettingsStore> = match config.redis_url.as_deref() {
        Some(url) => {
            let redis = RedisKv::new(Some(url));
            if redis.is_available().await {
                info!("redis connected, storing settings in redis");
            } else {
                info!("redis unavailable, settings will load as defaults and saves will fail");
            }
            Arc::new(RedisSettingsStore::new(redis))
        }
        None => Arc::new(FileSettingsStore::new(config.settings_path.clone())),
    };

    let settings = store.load().await;
    info!(
        provider = %settings.active_provider,
        has_key = settings.has_key(settings.active_provider),
        "settings loaded"
    );

    let server = DealFinderServer::new(store, config.providers, &settings);

    info!("MCP server ready, serving on stdio");
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!(error = %e, "MCP server error");
    })?;

    service.waiting().await?;
    info!("MCP server shut down");
    Ok(())
}
