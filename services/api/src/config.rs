//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

use autodoc_core::AiSettings;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where completion responses are cached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Database,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "database" | "db" => Ok(CacheBackend::Database),
            other => Err(format!("'{}' is not one of memory, database", other)),
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub media_root: PathBuf,
    /// Exposes internal error detail in API responses.
    pub debug: bool,
    pub deepseek_api_key: String,
    pub deepseek_api_url: String,
    pub deepseek_timeout: Duration,
    pub cache_backend: CacheBackend,
    pub cache_max_entries: usize,
    pub ai: AiSettings,
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
        let bind_address: SocketAddr = parse_var("BIND_ADDRESS", "0.0.0.0:3000")?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let media_root = std::env::var("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./media"));

        let debug = parse_flag("AUTODOC_DEBUG")?;

        // --- Load the Completion API Settings ---
        let deepseek_api_key = std::env::var("DEEPSEEK_API_KEY").unwrap_or_default();
        let deepseek_api_url = std::env::var("DEEPSEEK_API_URL")
            .unwrap_or_else(|_| "https://api.deepseek.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();
        let deepseek_timeout = Duration::from_secs(parse_var("DEEPSEEK_TIMEOUT", "30")?);

        let defaults = AiSettings::default();
        let ai = AiSettings {
            model: std::env::var("DEEPSEEK_MODEL").unwrap_or(defaults.model),
            max_tokens: parse_var("AI_MAX_TOKENS", "4000")?,
            temperature: parse_var("AI_TEMPERATURE", "0.7")?,
            document_temperature: parse_var("AI_DOCUMENT_TEMPERATURE", "0.3")?,
            cache_ttl: Duration::from_secs(parse_var::<u64>("AI_CACHE_HOURS", "24")? * 60 * 60),
            max_retries: parse_var("DEEPSEEK_MAX_RETRIES", "3")?,
            retry_backoff: Duration::from_millis(parse_var("DEEPSEEK_RETRY_BACKOFF_MS", "500")?),
        };

        // --- Load Cache Settings ---
        let cache_backend: CacheBackend = parse_var("CACHE_BACKEND", "memory")?;
        let cache_max_entries = parse_var("CACHE_MAX_ENTRIES", "1000")?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            media_root,
            debug,
            deepseek_api_key,
            deepseek_api_url,
            deepseek_timeout,
            cache_backend,
            cache_max_entries,
            ai,
        })
    }
}

/// Reads `name`, falling back to `default` when unset, and parses it.
fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

fn parse_flag(name: &str) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(false),
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "" | "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue(
                name.to_string(),
                format!("'{}' is not a boolean", other),
            )),
        },
    }
}
