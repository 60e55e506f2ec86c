//! Layered configuration: embedded defaults, an optional file, then
//! `AIRYRA_`-prefixed environment variables, then CLI flag overrides
//! (applied by the caller in `main`).

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Address the coordination server binds to.
    pub listen_addr: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Base directory holding one SQLite database per project.
    pub projects_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl Config {
    /// Load configuration from the embedded defaults plus environment
    /// variables, no explicit file.
    pub fn from_env() -> Result<Self> {
        let mut builder = ConfigBuilder::builder().add_source(File::from_str(
            include_str!("../config/default.toml"),
            FileFormat::Toml,
        ));

        if let Ok(config_file) = env::var("AIRYRA_CONFIG_FILE") {
            builder = builder.add_source(
                File::with_name(&config_file)
                    .required(false)
                    .format(FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("AIRYRA")
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build().context("failed to build configuration")?;
        let mut result: Config = config
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        Self::apply_standard_env_vars(&mut result);
        Ok(result)
    }

    /// Load configuration from an explicit file path, still subject to
    /// `AIRYRA_`-prefixed environment overrides.
    pub fn from_file(path: &str) -> Result<Self> {
        let builder = ConfigBuilder::builder()
            .add_source(File::from_str(
                include_str!("../config/default.toml"),
                FileFormat::Toml,
            ))
            .add_source(File::with_name(path).format(FileFormat::Toml))
            .add_source(
                Environment::with_prefix("AIRYRA")
                    .separator("_")
                    .try_parsing(true),
            );

        let config = builder
            .build()
            .context("failed to build configuration from file")?;

        let mut result: Config = config
            .try_deserialize()
            .context("failed to deserialize configuration from file")?;

        Self::apply_standard_env_vars(&mut result);
        Ok(result)
    }

    /// Compatibility overrides for the common deployment env vars, applied
    /// after the `config` crate's own `AIRYRA_`-prefixed pass.
    fn apply_standard_env_vars(config: &mut Config) {
        if let Ok(listen_addr) = env::var("LISTEN_ADDR") {
            config.server.listen_addr = listen_addr;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.logging.level = log_level;
        }
        if let Ok(projects_dir) = env::var("DATABASE_URL") {
            // compatibility: a bare directory path passed the way the prior
            // server accepted a `sqlite://` URL.
            if let Some(dir) = projects_dir.strip_prefix("sqlite://") {
                config.storage.projects_dir = dir.to_string();
            }
        }
    }

    /// Resolved projects directory, with `~` expanded against `$HOME`.
    pub fn projects_dir(&self) -> PathBuf {
        expand_home(&self.storage.projects_dir)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.listen_addr, self.server.port)
    }

    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(anyhow::anyhow!(
                    "invalid log level: {}. must be one of: trace, debug, info, warn, error",
                    self.logging.level
                ));
            }
        }

        if self.server.port == 0 {
            return Err(anyhow::anyhow!("server port cannot be 0"));
        }

        if self.storage.projects_dir.trim().is_empty() {
            return Err(anyhow::anyhow!("storage.projects_dir cannot be empty"));
        }

        Ok(())
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                listen_addr: "127.0.0.1".to_string(),
                port: 7432,
            },
            storage: StorageConfig {
                projects_dir: "~/.airyra/projects".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_the_documented_defaults() {
        let config = Config::default();
        assert_eq!(config.server.listen_addr, "127.0.0.1");
        assert_eq!(config.server.port, 7432);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn server_address_combines_host_and_port() {
        let config = Config::default();
        assert_eq!(config.server_address(), "127.0.0.1:7432");
    }

    #[test]
    fn validate_rejects_an_unknown_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_a_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_the_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn tilde_projects_dir_expands_against_home() {
        let config = Config::default();
        let resolved = config.projects_dir();
        assert!(resolved.ends_with(".airyra/projects"));
        assert!(resolved.is_absolute() || dirs::home_dir().is_none());
    }
}
