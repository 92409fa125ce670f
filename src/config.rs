use std::collections::HashMap;
use thiserror::Error;

use crate::domain::UserId;

/// Process configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Synthetic root for the Global program: the fallback parent when the
    /// direct sponsor chain is exhausted, so every global join succeeds.
    pub mother_id: UserId,
    /// Bounded retries for conditional counter/balance updates.
    pub write_retry_limit: u32,
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
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let mother_id = env_map
            .get("MOTHER_ID")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("MOTHER_ID".to_string()))?;
        if mother_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "MOTHER_ID".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let write_retry_limit = env_map
            .get("WRITE_RETRY_LIMIT")
            .map(|s| s.as_str())
            .unwrap_or("3")
            .parse::<u32>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "WRITE_RETRY_LIMIT".to_string(),
                    "must be a valid u32".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            mother_id: UserId::new(mother_id),
            write_retry_limit,
        })
    }
}
