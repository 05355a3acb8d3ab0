//! Configuration management for catman services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Job queue configuration (SQS)
    #[serde(default)]
    pub queue: QueueConfig,

    /// Search engine configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Periodic sweep configuration
    #[serde(default)]
    pub sweeper: SweeperConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Largest accepted article XML body
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Apply pending migrations on start-up
    #[serde(default)]
    pub run_migrations: bool,

    /// Directory holding the SQL migrations
    #[serde(default = "default_migrations_dir")]
    pub migrations_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// SQS job queue URL
    pub url: Option<String>,

    /// Dead letter queue URL
    pub dlq_url: Option<String>,

    /// AWS region override
    pub region: Option<String>,

    /// Maximum messages to receive per poll
    #[serde(default = "default_queue_batch_size")]
    pub batch_size: u32,

    /// Long polling timeout in seconds
    #[serde(default = "default_queue_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Visibility timeout in seconds
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_secs: u64,

    /// Give up retrying a send after this many seconds
    #[serde(default = "default_send_retry_window")]
    pub send_retry_window_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Elasticsearch node URLs
    #[serde(default = "default_search_nodes")]
    pub nodes: Vec<String>,

    /// Index receiving article documents
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Document type of article documents
    #[serde(default = "default_doc_type")]
    pub doc_type: String,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Consecutive failures before the circuit opens
    #[serde(default = "default_breaker_threshold")]
    pub breaker_failure_threshold: u32,

    /// Seconds the circuit stays open
    #[serde(default = "default_breaker_cooldown")]
    pub breaker_cooldown_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweeperConfig {
    /// Run the periodic sweeps inside the worker
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Seconds between orphan sweeps
    #[serde(default = "default_orphan_interval")]
    pub orphan_interval_secs: u64,

    /// Seconds between dirty sweeps
    #[serde(default = "default_dirty_interval")]
    pub dirty_interval_secs: u64,

    /// Rows fetched per sweep batch
    #[serde(default = "default_sweep_batch_size")]
    pub batch_size: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level filter (debug, info, warn, error or a full directive)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_max_body_bytes() -> usize { 10 * 1024 * 1024 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_migrations_dir() -> String { "migrations".to_string() }
fn default_queue_batch_size() -> u32 { 10 }
fn default_queue_poll_timeout() -> u64 { 20 }
fn default_visibility_timeout() -> u64 { 120 }
fn default_send_retry_window() -> u64 { 30 }
fn default_search_nodes() -> Vec<String> { vec!["http://localhost:9200".to_string()] }
fn default_index_name() -> String { "catman".to_string() }
fn default_doc_type() -> String { "article".to_string() }
fn default_search_timeout() -> u64 { 10 }
fn default_breaker_threshold() -> u32 { 5 }
fn default_breaker_cooldown() -> u64 { 30 }
fn default_orphan_interval() -> u64 { 3600 }
fn default_dirty_interval() -> u64 { 600 }
fn default_sweep_batch_size() -> u64 { 500 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: None,
            dlq_url: None,
            region: None,
            batch_size: default_queue_batch_size(),
            poll_timeout_secs: default_queue_poll_timeout(),
            visibility_timeout_secs: default_visibility_timeout(),
            send_retry_window_secs: default_send_retry_window(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            nodes: default_search_nodes(),
            index_name: default_index_name(),
            doc_type: default_doc_type(),
            timeout_secs: default_search_timeout(),
            breaker_failure_threshold: default_breaker_threshold(),
            breaker_cooldown_secs: default_breaker_cooldown(),
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            orphan_interval_secs: default_orphan_interval(),
            dirty_interval_secs: default_dirty_interval(),
            batch_size: default_sweep_batch_size(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__SEARCH__INDEX_NAME=catman
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("search.nodes")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }
}

impl SweeperConfig {
    pub fn orphan_interval(&self) -> Duration {
        Duration::from_secs(self.orphan_interval_secs.max(1))
    }

    pub fn dirty_interval(&self) -> Duration {
        Duration::from_secs(self.dirty_interval_secs.max(1))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/catman".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                run_migrations: false,
                migrations_dir: default_migrations_dir(),
            },
            queue: QueueConfig::default(),
            search: SearchConfig::default(),
            sweeper: SweeperConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.search.index_name, "catman");
        assert_eq!(config.search.doc_type, "article");
        assert!(config.sweeper.enabled);
    }

    #[test]
    fn test_server_timeouts() {
        let mut config = AppConfig::default();
        config.server.shutdown_timeout_secs = 5;
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_sections_take_defaults() {
        let config: AppConfig = Config::builder()
            .set_default("database.url", "postgres://db/catman")
            .unwrap()
            .set_default("search.index_name", "catman-test")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.database.url, "postgres://db/catman");
        assert_eq!(config.search.index_name, "catman-test");
        assert_eq!(config.search.doc_type, "article");
        assert_eq!(config.sweeper.batch_size, 500);
        assert_eq!(config.queue.batch_size, 10);
    }

    #[test]
    fn test_sweep_intervals_never_zero() {
        let mut config = SweeperConfig::default();
        config.dirty_interval_secs = 0;
        assert_eq!(config.dirty_interval(), Duration::from_secs(1));
    }
}
