//! services/client/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
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
    /// Base URL of the question source and session persistence endpoint.
    pub api_base_url: String,
    /// URL of the answer-processing backend.
    pub processing_url: String,
    pub storage_path: PathBuf,
    pub log_level: Level,
    pub prolific_id: String,
    pub push_retries: u32,
    pub push_backoff: Duration,
    pub processing_timeout: Duration,
    /// Bound on the wait for outstanding analysis work before completion.
    pub idle_wait: Duration,
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

        // --- Load Endpoint Settings ---
        let api_base_url = std::env::var("API_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000/api".to_string());
        let processing_url = std::env::var("PROCESSING_URL")
            .unwrap_or_else(|_| "http://localhost:8000/process-answer".to_string());

        let storage_path = std::env::var("STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./interview_session.json"));

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prolific_id = std::env::var("PROLIFIC_ID")
            .map_err(|_| ConfigError::MissingVar("PROLIFIC_ID".to_string()))?;

        // --- Load Tuning Settings ---
        let push_retries = parse_var("PUSH_RETRIES", 2u32)?;
        let push_backoff = Duration::from_millis(parse_var("PUSH_BACKOFF_MS", 500u64)?);
        let processing_timeout =
            Duration::from_secs(parse_var("PROCESSING_TIMEOUT_SECS", 45u64)?);
        let idle_wait = Duration::from_secs(parse_var("IDLE_WAIT_SECS", 60u64)?);

        Ok(Self {
            api_base_url,
            processing_url,
            storage_path,
            log_level,
            prolific_id,
            push_retries,
            push_backoff,
            processing_timeout,
            idle_wait,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw)),
        Err(_) => Ok(default),
    }
}
