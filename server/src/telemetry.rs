//! `tracing-subscriber` setup: env-filtered, with a format selectable
//! between pretty, json, and compact.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::{Config, LogFormat, LoggingConfig};

/// Initialize the global tracing subscriber.
pub fn init_telemetry(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .context("invalid log level configuration")?;

    let registry = Registry::default().with(env_filter);

    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true);
            registry.with(fmt_layer).init();
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_list(true)
                .flatten_event(true);
            registry.with(fmt_layer).init();
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false);
            registry.with(fmt_layer).init();
        }
    }

    tracing::info!(
        log_level = %config.level,
        log_format = ?config.format,
        "telemetry initialized"
    );

    Ok(())
}

/// Create a span around a store operation.
#[macro_export]
macro_rules! store_span {
    ($operation:expr) => {
        tracing::info_span!("store_operation", operation = $operation)
    };
    ($operation:expr, $($key:expr => $value:expr),*) => {
        tracing::info_span!("store_operation", operation = $operation, $($key = $value),*)
    };
}

/// Log resolved configuration at startup.
pub fn log_startup_info(config: &Config) {
    tracing::info!(
        server_address = %config.server_address(),
        projects_dir = %config.projects_dir().display(),
        log_level = %config.logging.level,
        "airyra coordination server starting up"
    );
}

/// Log the outcome of configuration validation.
pub fn log_config_validation(config: &Config) {
    match config.validate() {
        Ok(()) => tracing::debug!("configuration validated"),
        Err(e) => tracing::error!(error = %e, "configuration validation failed"),
    }
}

/// Log graceful shutdown completion.
pub fn log_shutdown_info() {
    tracing::info!("airyra coordination server shut down cleanly");
}
