use crate::domain::Decimal;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub trade_api_url: String,
    /// Lookback window for the batch fetch, in hours.
    pub lookback_hours: i64,
    /// Per-request timeout against the trade-history feed, in seconds.
    pub fetch_timeout_secs: u64,
    /// Monetary value of one pip per lot. A single constant for now; a
    /// per-instrument pip-value table would replace this input without
    /// touching the allocation algorithm.
    pub pip_value: Decimal,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let trade_api_url = env_map
            .get("TRADE_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("TRADE_API_URL".to_string()))?;

        let lookback_hours = env_map
            .get("LOOKBACK_HOURS")
            .map(|s| s.as_str())
            .unwrap_or("24")
            .parse::<i64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "LOOKBACK_HOURS".to_string(),
                    "must be a valid i64".to_string(),
                )
            })?;

        let fetch_timeout_secs = env_map
            .get("FETCH_TIMEOUT_SECS")
            .map(|s| s.as_str())
            .unwrap_or("10")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "FETCH_TIMEOUT_SECS".to_string(),
                    "must be a valid u64".to_string(),
                )
            })?;

        let pip_value = Decimal::from_str_canonical(
            env_map.get("PIP_VALUE").map(|s| s.as_str()).unwrap_or("10"),
        )
        .map_err(|_| {
            ConfigError::InvalidValue(
                "PIP_VALUE".to_string(),
                "must be a valid decimal".to_string(),
            )
        })?;

        Ok(Config {
            database_path,
            trade_api_url,
            lookback_hours,
            fetch_timeout_secs,
            pip_value,
        })
    }
}
