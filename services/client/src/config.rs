//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono_tz::Tz;
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
    /// Base URL of the StudyBuddy backend, without a trailing slash.
    pub api_url: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub request_timeout: Duration,
    pub max_upload_bytes: usize,
    /// IANA zone for floating and all-day calendar times.
    pub calendar_zone: Tz,
    pub session_leeway: chrono::Duration,
    pub sign_in_path: String,
    pub log_level: Level,
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
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
        };

        // --- Load Endpoint Settings ---
        let api_url = parse_url("STUDY_API_URL", &required("STUDY_API_URL")?)?;
        let supabase_url = parse_url("SUPABASE_URL", &required("SUPABASE_URL")?)?;
        let supabase_anon_key = required("SUPABASE_ANON_KEY")?;

        // --- Load Request Limits ---
        let request_timeout =
            Duration::from_secs(parse_number(&lookup, "REQUEST_TIMEOUT_SECS", 60)?);
        if request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "REQUEST_TIMEOUT_SECS".to_string(),
                "timeout must be greater than zero".to_string(),
            ));
        }
        let max_upload_bytes = parse_number(&lookup, "MAX_UPLOAD_MB", 25)? as usize * 1024 * 1024;
        let session_leeway =
            chrono::Duration::seconds(parse_number(&lookup, "SESSION_LEEWAY_SECS", 30)? as i64);

        // --- Load Calendar & UI Settings ---
        let zone_str =
            lookup("CALENDAR_TIMEZONE").unwrap_or_else(|| "America/Chicago".to_string());
        let calendar_zone = zone_str.trim().parse::<Tz>().map_err(|_| {
            ConfigError::InvalidValue(
                "CALENDAR_TIMEZONE".to_string(),
                format!("'{}' is not an IANA zone like America/Chicago", zone_str),
            )
        })?;

        let sign_in_path = lookup("SIGN_IN_PATH").unwrap_or_else(|| "/login".to_string());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            api_url,
            supabase_url,
            supabase_anon_key,
            request_timeout,
            max_upload_bytes,
            calendar_zone,
            session_leeway,
            sign_in_path,
            log_level,
        })
    }
}

fn parse_url(key: &str, value: &str) -> Result<String, ConfigError> {
    let parsed = reqwest::Url::parse(value)
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    Ok(value.trim_end_matches('/').to_string())
}

fn parse_number<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), format!("'{}' is not a number", raw))
        }),
    }
}
