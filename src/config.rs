//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::projection::{DriftPolicy, RebuildStrategy, RetryPolicy};
use crate::snapshot::SnapshotPolicy;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Environment (development, production)
    pub environment: String,

    /// Snapshot storage policy
    pub snapshot_policy: SnapshotPolicy,

    /// Version-mismatch retries for projection updates
    pub projection_max_retries: u32,

    /// Fixed delay between projection retries
    pub projection_retry_delay: Duration,

    pub projection_drift_policy: DriftPolicy,

    pub rebuild_strategy: RebuildStrategy,

    /// Page size for `load_by_name` and snapshot scans
    pub rebuild_page_size: i64,

    /// Interval of the projection catch-up job
    pub catch_up_interval: Duration,

    /// `json` switches the log output to JSON lines
    pub log_format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());
        let snapshot_policy = parse_or(&lookup, "SNAPSHOT_POLICY", SnapshotPolicy::Replace)?;
        let projection_max_retries = parse_or(&lookup, "PROJECTION_MAX_RETRIES", 3)?;
        let retry_delay_ms: u64 = parse_or(&lookup, "PROJECTION_RETRY_DELAY_MS", 1000)?;
        let projection_drift_policy =
            parse_or(&lookup, "PROJECTION_DRIFT_POLICY", DriftPolicy::Tolerate)?;
        let rebuild_strategy =
            parse_or(&lookup, "REBUILD_STRATEGY", RebuildStrategy::Incremental)?;
        let catch_up_secs: u64 = parse_or(&lookup, "CATCH_UP_INTERVAL_SECS", 30)?;
        let log_format = lookup("LOG_FORMAT").unwrap_or_else(|| "pretty".to_string());

        let rebuild_page_size: i64 = parse_or(&lookup, "REBUILD_PAGE_SIZE", 100)?;
        if rebuild_page_size < 1 {
            return Err(ConfigError::InvalidValue("REBUILD_PAGE_SIZE"));
        }
        if catch_up_secs == 0 {
            return Err(ConfigError::InvalidValue("CATCH_UP_INTERVAL_SECS"));
        }

        Ok(Self {
            database_url,
            database_max_connections,
            environment,
            snapshot_policy,
            projection_max_retries,
            projection_retry_delay: Duration::from_millis(retry_delay_ms),
            projection_drift_policy,
            rebuild_strategy,
            rebuild_page_size,
            catch_up_interval: Duration::from_secs(catch_up_secs),
            log_format,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Retry policy for projection updates
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.projection_max_retries,
            delay: self.projection_retry_delay,
            drift: self.projection_drift_policy,
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
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
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/eventkeep")]).unwrap();

        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.snapshot_policy, SnapshotPolicy::Replace);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.rebuild_strategy, RebuildStrategy::Incremental);
        assert_eq!(config.rebuild_page_size, 100);
        assert_eq!(config.catch_up_interval, Duration::from_secs(30));
        assert!(!config.is_production());
        assert!(!config.json_logs());
    }

    #[test]
    fn test_missing_database_url() {
        let result = load(&[]);
        assert!(matches!(result, Err(ConfigError::MissingEnv("DATABASE_URL"))));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://db/eventkeep"),
            ("SNAPSHOT_POLICY", "append"),
            ("PROJECTION_DRIFT_POLICY", "escalate"),
            ("PROJECTION_RETRY_DELAY_MS", "250"),
            ("REBUILD_STRATEGY", "full_copy"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(config.snapshot_policy, SnapshotPolicy::Append);
        assert_eq!(config.projection_drift_policy, DriftPolicy::Escalate);
        assert_eq!(config.projection_retry_delay, Duration::from_millis(250));
        assert_eq!(config.rebuild_strategy, RebuildStrategy::FullCopy);
        assert!(config.json_logs());
    }

    #[test]
    fn test_invalid_values() {
        let result = load(&[("DATABASE_URL", "x"), ("REBUILD_PAGE_SIZE", "0")]);
        assert!(matches!(result, Err(ConfigError::InvalidValue("REBUILD_PAGE_SIZE"))));

        let result = load(&[("DATABASE_URL", "x"), ("SNAPSHOT_POLICY", "sometimes")]);
        assert!(matches!(result, Err(ConfigError::InvalidValue("SNAPSHOT_POLICY"))));
    }
}
