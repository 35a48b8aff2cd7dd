//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub generation_model: String,
    /// Upper bound for one text-generation call; on elapse the section
    /// falls back to its placeholder.
    pub generation_timeout: Duration,
    pub scheduler_enabled: bool,
    pub scheduler_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://newsletters.db?mode=rwc".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load API Keys (as optional) ---
        // Without a key the synthesizer runs in deterministic offline mode.
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();

        // --- Load Adapter-specific Settings ---
        let generation_model =
            std::env::var("GENERATION_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let generation_timeout =
            parse_secs("GENERATION_TIMEOUT_SECS", 30)?;
        let scheduler_interval = parse_secs("SCHEDULER_INTERVAL_SECS", 3600)?;

        let scheduler_enabled = match std::env::var("SCHEDULER_ENABLED") {
            Ok(v) => v
                .parse::<bool>()
                .map_err(|_| {
                    ConfigError::InvalidValue(
                        "SCHEDULER_ENABLED".to_string(),
                        format!("'{}' is not a valid boolean", v),
                    )
                })?,
            Err(_) => true,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            generation_model,
            generation_timeout,
            scheduler_enabled,
            scheduler_interval,
        })
    }
}

fn parse_secs(var: &str, default_secs: u64) -> Result<Duration, ConfigError> {
    match std::env::var(var) {
        Ok(v) => v
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string())),
        Err(_) => Ok(Duration::from_secs(default_secs)),
    }
}
