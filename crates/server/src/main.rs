mod bootstrap;
mod dispatch;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use coverbot_core::config::{AppConfig, ConfigOverrides, LoadOptions};

/// Telegram bot that walks a user through an insurance purchase dialog.
#[derive(Debug, Parser)]
#[command(name = "coverbot-server", version, about)]
struct Cli {
    /// Path to a TOML config file (defaults to coverbot.toml if present).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn or error).
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn init_logging(config: &AppConfig) {
    use coverbot_core::config::LogFormat::*;
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
    let cli = Cli::parse();
    run(LoadOptions {
        config_path: cli.config,
        overrides: ConfigOverrides { log_level: cli.log_level, ..ConfigOverrides::default() },
    })
    .await
}

async fn run(options: LoadOptions) -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(options)?;
    init_logging(&config);

    // Now bootstrap using the same config we already loaded
    let app = bootstrap::bootstrap_with_config(config).await?;

    let sweep = bootstrap::spawn_retention_sweep(
        app.documents.clone(),
        app.config.storage.retention_hours,
        app.config.storage.sweep_interval_secs,
    );

    tracing::info!(
        event_name = "system.server.started",
        model = %app.config.genai.model,
        "coverbot-server started"
    );

    tokio::select! {
        result = app.poller.start() => result?,
        _ = tokio::signal::ctrl_c() => {}
    }

    sweep.abort();
    tracing::info!(event_name = "system.server.stopping", "coverbot-server stopping");

    Ok(())
}
