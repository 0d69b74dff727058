mod bootstrap;
mod chat;
mod health;
mod providers;

use std::time::Duration;

use anyhow::Result;
use aquaroute_core::config::{AppConfig, LoadOptions};
use tracing::{info, warn};

fn init_logging(config: &AppConfig) {
    use aquaroute_core::config::LogFormat::*;
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
    dotenvy::dotenv().ok();

    // Logging has to be up before bootstrap so rule-set loading is visible.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let routes = chat::router(chat::ChatState::new(app.router.clone()))
        .merge(health::router(health::HealthState::new(app.rule_sets.clone())));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "aquaroute-server listening"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    axum::serve(listener, routes).with_graceful_shutdown(wait_for_shutdown(grace)).await?;

    info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "aquaroute-server stopped"
    );
    Ok(())
}

async fn wait_for_shutdown(grace: Duration) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "could not listen for shutdown signal"
        );
        return;
    }
    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "draining in-flight requests"
    );
    // Hard stop if in-flight turns outlive the grace period.
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!(
            event_name = "system.server.forced_exit",
            correlation_id = "shutdown",
            "grace period elapsed with requests still in flight"
        );
        std::process::exit(1);
    });
}
