mod config;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use telemetry::{init_telemetry, log_config_validation, log_shutdown_info, log_startup_info};
use tracing::{error, info};

use airyra_core::repository::StoreManager;
use airyra_store::SqliteStoreManager;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "airyra-server")]
#[command(about = "Multi-tenant task coordination server for autonomous agents")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Address to bind the HTTP listener to.
    #[arg(long, env = "LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Port to listen on.
    #[arg(long)]
    port: Option<u16>,

    /// Base directory holding one SQLite database per project.
    #[arg(long, env = "AIRYRA_PROJECTS_DIR")]
    projects_dir: Option<String>,

    /// Configuration file path (TOML).
    #[arg(short, long, env = "AIRYRA_CONFIG_FILE")]
    config: Option<String>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format override (pretty, json, compact).
    #[arg(long)]
    log_format: Option<String>,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(config_file) => Config::from_file(config_file)?,
        None => Config::from_env()?,
    };

    if let Some(ref listen_addr) = cli.listen_addr {
        config.server.listen_addr = listen_addr.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref projects_dir) = cli.projects_dir {
        config.storage.projects_dir = projects_dir.clone();
    }
    if let Some(ref log_level) = cli.log_level {
        config.logging.level = log_level.clone();
    }
    if let Some(ref log_format) = cli.log_format {
        config.logging.format = match log_format.to_lowercase().as_str() {
            "pretty" => config::LogFormat::Pretty,
            "json" => config::LogFormat::Json,
            "compact" => config::LogFormat::Compact,
            other => {
                return Err(anyhow::anyhow!(
                    "invalid --log-format: {other}. must be one of: pretty, json, compact"
                ));
            }
        };
    }

    Ok(config)
}

const SHUTDOWN_DRAIN: std::time::Duration = std::time::Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli).context("failed to load configuration")?;

    init_telemetry(&config.logging).context("failed to initialize telemetry")?;
    log_config_validation(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "configuration validation failed");
        std::process::exit(1);
    }

    log_startup_info(&config);

    let store = Arc::new(SqliteStoreManager::new(config.projects_dir()));
    let addr = config
        .server_address()
        .parse()
        .context("invalid listen address")?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            let mut sigint =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
                    .expect("failed to register SIGINT handler");

            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, initiating graceful shutdown"),
                _ = sigint.recv() => info!("received SIGINT, initiating graceful shutdown"),
            }
        }

        #[cfg(windows)]
        {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl+c");
            info!("received Ctrl+C, initiating graceful shutdown");
        }

        let _ = shutdown_tx.send(());
    });

    let store_for_shutdown = store.clone();
    let shutdown = async move {
        let _ = shutdown_rx.await;
    };

    info!(%addr, "airyra ready");

    let serve_result =
        tokio::time::timeout(SHUTDOWN_DRAIN + std::time::Duration::from_secs(5), async {
            airyra_api::serve(addr, store.clone() as Arc<dyn StoreManager>, shutdown).await
        })
        .await;

    store_for_shutdown.close().await.ok();
    log_shutdown_info();

    match serve_result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!(error = %e, "server error");
            std::process::exit(3);
        }
        Err(_) => {
            error!("shutdown drain window exceeded, forcing exit");
            std::process::exit(4);
        }
    }
}
