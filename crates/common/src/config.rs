//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration (optional; realtime stays in-process without it).
    #[serde(default)]
    pub redis: RedisConfig,
    /// Serverless function endpoint configuration.
    pub lambda: LambdaConfig,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Content listing limits.
    #[serde(default)]
    pub listing: ListingConfig,
    /// Job change relay settings.
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    #[serde(default = "default_url")]
    pub url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            url: default_url(),
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    #[serde(default)]
    pub url: Option<String>,
    /// Key prefix for all Redis channels.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            prefix: default_redis_prefix(),
        }
    }
}

/// Serverless function (lambda) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LambdaConfig {
    /// Invoke endpoint URL.
    pub endpoint: String,
    /// Request timeout in seconds.
    #[serde(default = "default_lambda_timeout")]
    pub timeout_secs: u64,
    /// Optional API key sent as `x-api-key`.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret used to validate bearer tokens.
    pub jwt_secret: String,
    /// Accept requests without a token (development only).
    #[serde(default)]
    pub allow_anonymous: bool,
}

/// Job change relay settings.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    /// How often job rows are checked for changes, in milliseconds.
    #[serde(default = "default_watch_interval_ms")]
    pub watch_interval_ms: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            watch_interval_ms: default_watch_interval_ms(),
        }
    }
}

/// Limits for content listing and search.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    /// Page size used when the caller does not pass one.
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    /// Upper bound on any requested page size.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u64,
    /// Number of rows requested from the search functions before
    /// client-side filtering and slicing.
    #[serde(default = "default_search_superset")]
    pub search_superset: u64,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            search_superset: default_search_superset(),
        }
    }
}

impl ListingConfig {
    /// Clamp a requested page size into `1..=max_page_size`.
    #[must_use]
    pub fn clamp_limit(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3002
}

fn default_url() -> String {
    "http://localhost:3002".to_string()
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_redis_prefix() -> String {
    "list".to_string()
}

const fn default_lambda_timeout() -> u64 {
    30
}

const fn default_watch_interval_ms() -> u64 {
    1000
}

const fn default_page_size() -> u64 {
    20
}

const fn default_max_page_size() -> u64 {
    100
}

const fn default_search_superset() -> u64 {
    200
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, into the process environment)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `LIST_ENV`)
    /// 4. Environment variables with `LIST_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let env = std::env::var("LIST_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("LIST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("LIST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
