//! Command-line and environment configuration.

use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, ValueEnum};
use yapi_mcp::{BackendConfig, CacheConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    /// Install no subscriber at all
    None,
}

impl LogLevel {
    pub fn directive(self) -> Option<&'static str> {
        match self {
            LogLevel::Debug => Some("debug"),
            LogLevel::Info => Some("info"),
            LogLevel::Warn => Some("warn"),
            LogLevel::Error => Some("error"),
            LogLevel::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Transport {
    /// JSON-RPC over stdin/stdout
    Stdio,
    /// Streamable HTTP at /mcp
    Http,
}

#[derive(Debug, Parser)]
#[command(name = "yapi-mcp", version, about = "MCP server for YApi API documentation")]
pub struct Args {
    /// YApi base URL, e.g. https://yapi.example.com
    #[arg(long, env = "YAPI_BASE_URL")]
    pub base_url: String,

    /// Project tokens as `projectId:token,projectId:token`
    #[arg(long, env = "YAPI_TOKEN", hide_env_values = true)]
    pub token: String,

    /// Project snapshot time-to-live in minutes
    #[arg(long, env = "YAPI_CACHE_TTL", default_value_t = 10)]
    pub cache_ttl: u64,

    /// Snapshot directory [default: <platform cache dir>/yapi-mcp]
    #[arg(long, env = "YAPI_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    #[arg(long, env = "YAPI_LOG_LEVEL", value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    #[arg(long, env = "YAPI_TRANSPORT", value_enum, default_value_t = Transport::Stdio)]
    pub transport: Transport,

    /// Listen address for the http transport
    #[arg(long, env = "YAPI_LISTEN", default_value = "127.0.0.1:3388")]
    pub listen: SocketAddr,

    /// Per-request backend timeout in seconds
    #[arg(long, env = "YAPI_REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout: u64,

    /// Delete the on-disk snapshot before starting
    #[arg(long)]
    pub clear_cache: bool,
}

impl Args {
    pub fn backend_config(&self) -> BackendConfig {
        let mut config = BackendConfig::new(self.base_url.trim());
        config.request_timeout_secs = self.request_timeout;
        config
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig::new(self.resolved_cache_dir()).with_ttl_minutes(self.cache_ttl)
    }

    fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("yapi-mcp")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec![
            "yapi-mcp",
            "--base-url",
            "https://yapi.example.com",
            "--token",
            "10:abc",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--cache-dir", "/tmp/yapi-test"]);
        assert_eq!(args.cache_ttl, 10);
        assert_eq!(args.log_level, LogLevel::Info);
        assert_eq!(args.transport, Transport::Stdio);
        assert_eq!(args.listen, "127.0.0.1:3388".parse().unwrap());
        assert!(!args.clear_cache);

        let cache = args.cache_config();
        assert_eq!(cache.ttl_minutes, 10);
        assert_eq!(cache.cache_dir, PathBuf::from("/tmp/yapi-test"));
        assert_eq!(args.backend_config().request_timeout_secs, 30);
    }

    #[test]
    fn test_overrides() {
        let args = parse(&[
            "--cache-ttl",
            "360",
            "--log-level",
            "none",
            "--transport",
            "http",
            "--request-timeout",
            "5",
            "--clear-cache",
        ]);
        assert_eq!(args.cache_config().ttl_minutes, 360);
        assert_eq!(args.log_level.directive(), None);
        assert_eq!(args.transport, Transport::Http);
        assert_eq!(args.backend_config().request_timeout_secs, 5);
        assert!(args.clear_cache);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let result = Args::try_parse_from([
            "yapi-mcp",
            "--base-url",
            "https://yapi.example.com",
            "--token",
            "10:abc",
            "--log-level",
            "verbose",
        ]);
        assert!(result.is_err());
    }
}
