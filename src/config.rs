//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{CacheConfig, Retry, RetryDelay};
use crate::storage::Storage;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server port
    pub server_port: u16,
    /// Age in ms after which cached values are revalidated in the background
    pub min_time_to_stale_ms: u64,
    /// Age in ms after which cached values are discarded; 0 means never
    pub max_time_to_live_ms: u64,
    /// Number of retries for a failing origin fetch
    pub retry: u32,
    /// Fixed delay between retries in ms; unset uses exponential backoff
    pub retry_delay_ms: Option<u64>,
    /// Directory for file storage; unset keeps entries in memory
    pub storage_dir: Option<PathBuf>,
    /// Base URL values are fetched from on miss or staleness
    pub origin_url: Option<String>,
}

impl ServerConfig {
    /// Creates a new ServerConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `MIN_TIME_TO_STALE_MS` - Staleness threshold (default: 0)
    /// - `MAX_TIME_TO_LIVE_MS` - TTL, 0 for none (default: 0)
    /// - `RETRY` - Origin fetch retries (default: 0)
    /// - `RETRY_DELAY_MS` - Fixed retry delay (default: exponential backoff)
    /// - `STORAGE_DIR` - File storage directory (default: in-memory)
    /// - `ORIGIN_URL` - Origin base URL (default: none)
    pub fn from_env() -> Self {
        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(3000),
            min_time_to_stale_ms: parse_var("MIN_TIME_TO_STALE_MS").unwrap_or(0),
            max_time_to_live_ms: parse_var("MAX_TIME_TO_LIVE_MS").unwrap_or(0),
            retry: parse_var("RETRY").unwrap_or(0),
            retry_delay_ms: parse_var("RETRY_DELAY_MS"),
            storage_dir: non_empty_var("STORAGE_DIR").map(PathBuf::from),
            origin_url: non_empty_var("ORIGIN_URL"),
        }
    }

    /// Builds the engine configuration over `storage`.
    pub fn cache_config(&self, storage: Arc<dyn Storage>) -> CacheConfig {
        let retry_delay = match self.retry_delay_ms {
            Some(ms) => RetryDelay::Fixed(ms),
            None => RetryDelay::Exponential,
        };

        CacheConfig::new(storage)
            .min_time_to_stale(self.min_time_to_stale_ms)
            .max_time_to_live(self.max_time_to_live_ms)
            .retry(Retry::Count(self.retry))
            .retry_delay(retry_delay)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_port: 3000,
            min_time_to_stale_ms: 0,
            max_time_to_live_ms: 0,
            retry: 0,
            retry_delay_ms: None,
            storage_dir: None,
            origin_url: None,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::parse_config;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.min_time_to_stale_ms, 0);
        assert_eq!(config.max_time_to_live_ms, 0);
        assert!(config.storage_dir.is_none());
        assert!(config.origin_url.is_none());
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        for name in [
            "SERVER_PORT",
            "MIN_TIME_TO_STALE_MS",
            "MAX_TIME_TO_LIVE_MS",
            "RETRY",
            "RETRY_DELAY_MS",
            "STORAGE_DIR",
            "ORIGIN_URL",
        ] {
            env::remove_var(name);
        }

        let config = ServerConfig::from_env();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.retry, 0);
        assert_eq!(config.retry_delay_ms, None);
        assert!(config.origin_url.is_none());
    }

    #[test]
    fn test_default_cache_config_parses() {
        let config = ServerConfig::default().cache_config(Arc::new(MemoryStorage::new()));
        let parsed = parse_config(&config).unwrap();
        assert_eq!(parsed.max_time_to_live, None);
    }

    #[test]
    fn test_inconsistent_thresholds_fail_to_parse() {
        let server = ServerConfig {
            min_time_to_stale_ms: 10_000,
            max_time_to_live_ms: 5_000,
            ..ServerConfig::default()
        };
        let config = server.cache_config(Arc::new(MemoryStorage::new()));
        assert!(parse_config(&config).is_err());
    }
}
