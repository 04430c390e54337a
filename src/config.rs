//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Page size used when reading aggregate streams
    pub event_batch_size: usize,

    /// Delay between saga subscription polls
    pub saga_poll_interval: Duration,

    /// Deliveries of a failing event before it is parked
    pub saga_max_deliveries: u32,

    pub log_format: LogFormat,

    /// Environment (development, production)
    pub environment: String,
}

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;
        let event_batch_size: usize = parse_or(&lookup, "EVENT_BATCH_SIZE", 100)?;
        if event_batch_size == 0 {
            return Err(ConfigError::InvalidValue("EVENT_BATCH_SIZE"));
        }

        let saga_poll_interval = Duration::from_millis(parse_or(&lookup, "SAGA_POLL_INTERVAL_MS", 500)?);

        let saga_max_deliveries: u32 = parse_or(&lookup, "SAGA_MAX_DELIVERIES", 5)?;
        if saga_max_deliveries == 0 {
            return Err(ConfigError::InvalidValue("SAGA_MAX_DELIVERIES"));
        }

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(_) => return Err(ConfigError::InvalidValue("LOG_FORMAT")),
        };

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        Ok(Self {
            database_url,
            database_max_connections,
            event_batch_size,
            saga_poll_interval,
            saga_max_deliveries,
            log_format,
            environment,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue(key)),
        None => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/ledger")]).unwrap();

        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.event_batch_size, 100);
        assert_eq!(config.saga_poll_interval, Duration::from_millis(500));
        assert_eq!(config.saga_max_deliveries, 5);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(!config.is_production());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/ledger"),
            ("EVENT_BATCH_SIZE", "25"),
            ("SAGA_POLL_INTERVAL_MS", "50"),
            ("LOG_FORMAT", "json"),
            ("ENVIRONMENT", "production"),
        ])
        .unwrap();

        assert_eq!(config.event_batch_size, 25);
        assert_eq!(config.saga_poll_interval, Duration::from_millis(50));
        assert_eq!(config.log_format, LogFormat::Json);
        assert!(config.is_production());
    }

    #[test]
    fn test_missing_and_invalid_values() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingEnv("DATABASE_URL"))));
        assert!(matches!(
            load(&[("DATABASE_URL", "x"), ("EVENT_BATCH_SIZE", "0")]),
            Err(ConfigError::InvalidValue("EVENT_BATCH_SIZE"))
        ));
        assert!(matches!(
            load(&[("DATABASE_URL", "x"), ("SAGA_MAX_DELIVERIES", "many")]),
            Err(ConfigError::InvalidValue("SAGA_MAX_DELIVERIES"))
        ));
        assert!(matches!(
            load(&[("DATABASE_URL", "x"), ("LOG_FORMAT", "xml")]),
            Err(ConfigError::InvalidValue("LOG_FORMAT"))
        ));
    }
}
