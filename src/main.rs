mod bot;
mod compose;
mod config;
mod extract;
mod handlers;
mod pipeline;
mod shorten;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::{Config, ConfigStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Initialize logging, seeded from the configured verbosity
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},dealbot=debug", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Configuration loaded from: {}", config_path.display());
    info!("  Amazon marketplace: amazon.{}", config.amazon.country);
    info!("  Excluded users: {}", config.excluded_users.len());
    info!("  Discount keywords: {:?}", config.discount_keywords);
    info!(
        "  Config reload every {} seconds",
        config.reload_interval_secs
    );

    let store = Arc::new(ConfigStore::new(config_path, config));

    // Periodic reload: wholesale snapshot replace; a failed read keeps the
    // previous snapshot active.
    {
        let store = store.clone();
        tokio::spawn(async move {
            loop {
                let secs = store.current().reload_interval_secs;
                tokio::time::sleep(Duration::from_secs(secs)).await;
                match store.reload() {
                    Ok(()) => info!("Configuration reloaded"),
                    Err(e) => warn!("Config reload failed, keeping previous configuration: {:#}", e),
                }
            }
        });
    }

    // Run the Telegram bot
    let state = Arc::new(AppState::new(store)?);
    info!("Bot is starting...");
    bot::run(state).await?;

    Ok(())
}
