//! Scout Ping
//!
//! A worker process executing TCP connect checks for the Scout platform.
//!
//! Architecture:
//! - Configuration: runtime parameters from environment or defaults
//! - Client: HTTP communication with the coordinator
//! - Probe: the TCP connect job factory
//! - Scheduler: check polling and lifecycle management (scout-worker)
//!
//! The worker polls the coordinator for due checks, probes the monitored
//! objects concurrently and commits batched status updates back.

mod probe;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::probe::TcpConnectFactory;
use scout_client::CoordinatorClient;
use scout_worker::{Config, Scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scout_ping=info,scout_worker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Scout ping worker");

    // Load configuration
    let config = load_config()?;
    info!(
        "Loaded configuration: plugin={}, coordinator_url={}",
        config.plugin_name, config.coordinator_url
    );

    // Initialize coordinator client
    let client = Arc::new(build_client(&config)?);
    info!("Coordinator client initialized");

    // Create the scheduler and wire the shutdown signal
    let scheduler = Scheduler::new(config, client, Arc::new(TcpConnectFactory));

    let shutdown = scheduler.shutdown_signal();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Received interrupt, stopping after the current cycle");
        shutdown.set();
    });

    // Start the scheduling loop
    info!("Starting scheduling loop");
    if let Err(e) = scheduler.run().await {
        error!("Scheduler error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Loads configuration from environment variables with fallback to defaults
fn load_config() -> Result<Config> {
    match Config::from_env() {
        Ok(config) => {
            config.validate()?;
            Ok(config)
        }
        Err(_) => {
            info!("Failed to load config from environment, using defaults");
            let config = Config::new("ping", "http://localhost:8080");
            config.validate()?;
            Ok(config)
        }
    }
}

/// Builds the HTTP client, applying the configured call timeout
fn build_client(config: &Config) -> Result<CoordinatorClient> {
    let client = match config.check_timeout {
        Some(timeout) => {
            let http = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .context("Failed to build HTTP client")?;
            CoordinatorClient::with_client(config.coordinator_url.clone(), http)
        }
        None => CoordinatorClient::new(config.coordinator_url.clone()),
    };

    Ok(client)
}
