//! Backend and cache configuration types.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use url::Url;

/// Connection settings for the YApi backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Base URL of the YApi deployment, e.g. `https://yapi.example.com`
    pub base_url: String,

    /// Total per-request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout (seconds)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Page size used for interface listing calls
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

/// Metadata cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Directory holding the persisted project snapshot
    pub cache_dir: PathBuf,

    /// Snapshot time-to-live (minutes)
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,

    /// Retry budget for transient failures inside a full refresh (seconds).
    /// Zero disables retries.
    #[serde(default = "default_refresh_retry_max_elapsed")]
    pub refresh_retry_max_elapsed_secs: u64,

    /// First on-demand backoff delay after a failure (milliseconds)
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for the on-demand backoff delay (seconds)
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_page_size() -> u32 {
    1000
}

fn default_ttl_minutes() -> u64 {
    10
}

fn default_refresh_retry_max_elapsed() -> u64 {
    15
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_max_secs() -> u64 {
    300 // 5 minutes
}

impl BackendConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            page_size: default_page_size(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), String> {
        let s = self.base_url.trim();
        if s.is_empty() {
            return Err("base_url should not be empty".to_string());
        }

        let url = Url::parse(s).map_err(|e| format!("invalid base_url: {}", e))?;
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(format!("unsupported base_url scheme: {}", scheme));
        }
        if url.host().is_none() {
            return Err("base_url must have a host".to_string());
        }

        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be greater than 0".to_string());
        }
        if self.page_size == 0 {
            return Err("page_size must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl CacheConfig {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ttl_minutes: default_ttl_minutes(),
            refresh_retry_max_elapsed_secs: default_refresh_retry_max_elapsed(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_secs: default_backoff_max_secs(),
        }
    }

    #[must_use]
    pub fn with_ttl_minutes(mut self, ttl_minutes: u64) -> Self {
        self.ttl_minutes = ttl_minutes;
        self
    }

    pub fn refresh_retry_max_elapsed(&self) -> Duration {
        Duration::from_secs(self.refresh_retry_max_elapsed_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.cache_dir.join(crate::store::SNAPSHOT_FILE)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err("cache_dir should not be empty".to_string());
        }
        if self.backoff_base_ms > self.backoff_max_secs.saturating_mul(1000) {
            return Err("backoff_base_ms must not exceed backoff_max_secs".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_config() {
        let config = BackendConfig::new("https://yapi.example.com");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.page_size, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_config_rejects_bad_urls() {
        assert!(BackendConfig::new("").validate().is_err());
        assert!(BackendConfig::new("not a url").validate().is_err());
        assert!(BackendConfig::new("ftp://yapi.example.com")
            .validate()
            .is_err());
    }

    #[test]
    fn test_default_cache_config() {
        let config = CacheConfig::new("/tmp/yapi");
        assert_eq!(config.ttl_minutes, 10);
        assert_eq!(config.refresh_retry_max_elapsed(), Duration::from_secs(15));
        assert_eq!(config.backoff_base(), Duration::from_secs(1));
        assert_eq!(config.backoff_max(), Duration::from_secs(300));
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/tmp/yapi/project-cache.json")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_config_serde_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"cache_dir": "/var/cache/yapi", "ttl_minutes": 360}"#)
                .expect("Failed to parse");
        assert_eq!(config.ttl_minutes, 360);
        assert_eq!(config.backoff_max_secs, 300);
    }

    #[test]
    fn test_cache_config_rejects_inverted_backoff() {
        let mut config = CacheConfig::new("/tmp/yapi");
        config.backoff_base_ms = 10_000;
        config.backoff_max_secs = 1;
        assert!(config.validate().is_err());
    }
}
