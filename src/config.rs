//! Environment configuration
//!
//! Values come from the process environment (optionally seeded from `.env`).

use crate::error::OrchestrationError;
use crate::Result;
use std::time::Duration;

pub const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Absent means the offline keyword oracle is used
    pub gemini_api_key: Option<String>,
    pub gemini_model_url: Option<String>,
    pub assistant_base_url: String,
    pub oracle_timeout: Duration,
    pub dispatch_timeout: Duration,
    pub port: u16,
}

impl OrchestratorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let assistant_base_url = non_empty("ASSISTANT_MICROSERVICE_URL").ok_or_else(|| {
            OrchestrationError::ConfigError(
                "ASSISTANT_MICROSERVICE_URL environment variable is not set".to_string(),
            )
        })?;

        let oracle_timeout = Duration::from_secs(parse_or(
            "ORACLE_TIMEOUT_SECS",
            non_empty("ORACLE_TIMEOUT_SECS"),
            DEFAULT_ORACLE_TIMEOUT_SECS,
        )?);
        let dispatch_timeout = Duration::from_secs(parse_or(
            "DISPATCH_TIMEOUT_SECS",
            non_empty("DISPATCH_TIMEOUT_SECS"),
            DEFAULT_DISPATCH_TIMEOUT_SECS,
        )?);

        let port = parse_or(
            "PORT",
            non_empty("PORT").or_else(|| non_empty("API_PORT")),
            DEFAULT_PORT,
        )?;

        Ok(Self {
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            gemini_model_url: non_empty("GEMINI_MODEL_URL"),
            assistant_base_url: assistant_base_url.trim_end_matches('/').to_string(),
            oracle_timeout,
            dispatch_timeout,
            port,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| {
            OrchestrationError::ConfigError(format!("{} has an invalid value: {}", key, value))
        }),
    }
}
