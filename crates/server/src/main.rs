mod bootstrap;
mod health;
mod ingress;
mod integrations;

use std::time::Duration;

use anyhow::Result;
use garcon_core::config::{AppConfig, LoadOptions};
use tokio::sync::oneshot;

fn init_logging(config: &AppConfig) {
    use garcon_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);

    let (stop_http, http_stopped) = oneshot::channel();
    let http = health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        health::HealthState::new(app.runtime.clone(), app.transport_mode),
        app.ingress,
        http_stopped,
    )
    .await?;

    let runner = app.runner;
    let pump = tokio::spawn(async move { runner.start().await });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        transport_mode = app.transport_mode.as_str(),
        "garcon-server started"
    );
    wait_for_shutdown().await?;
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "garcon-server stopping"
    );

    // Stopping the listener drops the ingress sender, which ends the envelope pump.
    let _ = stop_http.send(());
    if tokio::time::timeout(grace, async {
        let _ = http.await;
        let _ = pump.await;
    })
    .await
    .is_err()
    {
        tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            active_sessions = app.runtime.sessions().active_count().await,
            "graceful shutdown window elapsed; abandoning in-flight work"
        );
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
