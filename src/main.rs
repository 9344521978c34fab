use anyhow::{Context, Result};
use tracing::{info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

mod access;
mod action;
mod catalog;
mod commands;
mod config;
mod dispatch;
mod error;
mod metrics;
mod pagination;
mod protocol;
mod ratelimit;
mod render;
mod server;
mod session;
mod transport;

use access::AccessStore;
use catalog::Catalog;
use dispatch::Dispatcher;
use metrics::Metrics;
use transport::RestTransport;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("blueprint_bot=info".parse()?)
        )
        .init();

    info!("Starting blueprint bot");

    let config = config::load_config()?;
    info!("Configuration loaded");

    let bot_token = std::env::var("DISCORD_BOT_TOKEN")
        .context("DISCORD_BOT_TOKEN environment variable not set; set it before starting the bot")?;

    let catalog = Catalog::load(&config.catalog.path, Some(config.catalog.image_dir.clone()))
        .with_context(|| format!("Failed to load catalog {}", config.catalog.path.display()))?;
    if catalog.is_empty() {
        warn!("Catalog {} has no blueprints", config.catalog.path.display());
    }
    info!("Catalog loaded: {} blueprints", catalog.len());

    let access = AccessStore::load(config.access.store_path.clone())
        .with_context(|| format!("Failed to load access store {}", config.access.store_path.display()))?;

    let transport = Arc::new(RestTransport::new(
        config.discord.api_base.clone(),
        config.discord.application_id.clone(),
        bot_token,
        config.discord.request_timeout_ms,
    )?);

    if config.discord.register_commands {
        match commands::register(&transport).await {
            Ok(()) => info!("Slash commands registered"),
            Err(e) => warn!("Slash command registration failed: {}", e),
        }
    }

    let metrics = Arc::new(Metrics::new());
    tokio::spawn(metrics::run_metrics_server(config.metrics.clone(), metrics.clone()));

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::new(catalog),
        transport,
        access,
        metrics.clone(),
        &config.limits,
        &config.pagination,
    ));

    // Periodic expiry of idle listings
    let reaper = dispatcher.clone();
    let reap_every = Duration::from_secs(config.pagination.reaper_interval_secs.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(reap_every);
        loop {
            interval.tick().await;
            reaper.reap_idle(Instant::now()).await;
        }
    });

    server::run(config, dispatcher, metrics).await?;

    Ok(())
}
