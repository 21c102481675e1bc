//! Relay server application
//!
//! Accepts one authenticated publisher on `/stream` and relays its audio to
//! every listener on `/listen`.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relaycast::{
    auth::RemoteAuthenticator,
    config::AppConfig,
    http::WebServer,
    relay::Relay,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting relaycast {}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref()).context("failed to load configuration")?;

    let relay = Arc::new(Relay::new(config.relay.clone()));
    let authenticator = Arc::new(
        RemoteAuthenticator::new(&config.auth).context("failed to build auth client")?,
    );

    tracing::info!(
        history_capacity = config.relay.history_capacity,
        subscriber_queue = config.relay.subscriber_queue,
        "Relay ready"
    );

    let server = WebServer::new(config.server.clone(), relay, authenticator);
    let listener = server.bind().await.context("failed to bind listen address")?;

    server
        .run_until(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await?;

    println!("Shutting down...");
    Ok(())
}
