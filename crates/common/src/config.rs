//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Federation configuration.
    #[serde(default)]
    pub federation: FederationConfig,
    /// Worker pool sizing.
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Timeline cache tuning.
    #[serde(default)]
    pub timeline: TimelineConfig,
    /// Media storage.
    #[serde(default)]
    pub media: MediaConfig,
    /// Registration and credential policy.
    #[serde(default)]
    pub accounts: AccountsConfig,
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
    pub url: String,
}

impl ServerConfig {
    /// Host part of the public URL, used as the local account domain.
    #[must_use]
    pub fn domain(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.clone())
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

/// Federation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// Whether federation is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Timeout for outgoing requests, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Delivery attempts per inbox before giving up.
    #[serde(default = "default_delivery_attempts")]
    pub delivery_attempts: u32,
    /// Initial backoff between delivery attempts, in milliseconds.
    #[serde(default = "default_delivery_backoff_ms")]
    pub delivery_backoff_ms: u64,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            request_timeout_secs: default_request_timeout_secs(),
            delivery_attempts: default_delivery_attempts(),
            delivery_backoff_ms: default_delivery_backoff_ms(),
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    /// Concurrent workers for client-originated messages.
    #[serde(default = "default_workers")]
    pub client_workers: usize,
    /// Queue capacity for client-originated messages.
    #[serde(default = "default_queue_size")]
    pub client_queue_size: usize,
    /// Concurrent workers for federator-originated messages.
    #[serde(default = "default_workers")]
    pub federator_workers: usize,
    /// Queue capacity for federator-originated messages.
    #[serde(default = "default_queue_size")]
    pub federator_queue_size: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            client_workers: default_workers(),
            client_queue_size: default_queue_size(),
            federator_workers: default_workers(),
            federator_queue_size: default_queue_size(),
        }
    }
}

/// Timeline cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TimelineConfig {
    /// Entries kept per account after a prune pass.
    #[serde(default = "default_retain_length")]
    pub retain_length: usize,
    /// Seconds between prune passes.
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,
    /// How many of the newest entries are checked when deciding whether a boost is a reinsertion.
    #[serde(default = "default_boost_reinsertion_depth")]
    pub boost_reinsertion_depth: usize,
    /// Page size used when a caller does not pass a limit.
    #[serde(default = "default_page_limit")]
    pub default_limit: usize,
}

impl TimelineConfig {
    /// Interval between prune passes.
    #[must_use]
    pub const fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            retain_length: default_retain_length(),
            prune_interval_secs: default_prune_interval_secs(),
            boost_reinsertion_depth: default_boost_reinsertion_depth(),
            default_limit: default_page_limit(),
        }
    }
}

/// Media storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Directory files are written to.
    #[serde(default = "default_media_path")]
    pub storage_path: PathBuf,
    /// URL prefix files are served from.
    #[serde(default = "default_media_url")]
    pub base_url: String,
    /// Maximum accepted upload, in bytes.
    #[serde(default = "default_max_media_size")]
    pub max_size: u64,
    /// Maximum description length.
    #[serde(default = "default_max_description")]
    pub max_description_chars: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            storage_path: default_media_path(),
            base_url: default_media_url(),
            max_size: default_max_media_size(),
            max_description_chars: default_max_description(),
        }
    }
}

/// Account registration policy.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountsConfig {
    /// Whether new sign-ups are accepted.
    #[serde(default = "default_true")]
    pub registration_open: bool,
    /// Whether new sign-ups wait for moderator approval.
    #[serde(default)]
    pub approval_required: bool,
    /// Minimum password length.
    #[serde(default = "default_min_password")]
    pub min_password_length: usize,
    /// Maximum status length in characters.
    #[serde(default = "default_max_status")]
    pub max_status_chars: usize,
    /// Maximum content warning length in characters.
    #[serde(default = "default_max_cw")]
    pub max_content_warning_chars: usize,
    /// Maximum attachments per status.
    #[serde(default = "default_max_attachments")]
    pub max_attachments: usize,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            registration_open: true,
            approval_required: false,
            min_password_length: default_min_password(),
            max_status_chars: default_max_status(),
            max_content_warning_chars: default_max_cw(),
            max_attachments: default_max_attachments(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8080
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_true() -> bool {
    true
}

const fn default_request_timeout_secs() -> u64 {
    10
}

const fn default_delivery_attempts() -> u32 {
    5
}

const fn default_delivery_backoff_ms() -> u64 {
    2_000
}

const fn default_workers() -> usize {
    4
}

const fn default_queue_size() -> usize {
    1_000
}

const fn default_retain_length() -> usize {
    200
}

const fn default_prune_interval_secs() -> u64 {
    300
}

const fn default_boost_reinsertion_depth() -> usize {
    50
}

const fn default_page_limit() -> usize {
    20
}

fn default_media_path() -> PathBuf {
    PathBuf::from("./files")
}

fn default_media_url() -> String {
    "/files".to_string()
}

const fn default_max_media_size() -> u64 {
    10 * 1024 * 1024
}

const fn default_max_description() -> usize {
    1_500
}

const fn default_min_password() -> usize {
    8
}

const fn default_max_status() -> usize {
    5_000
}

const fn default_max_cw() -> usize {
    500
}

const fn default_max_attachments() -> usize {
    4
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `PLAZA_ENV`)
    /// 3. Environment variables with `PLAZA__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("PLAZA_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("PLAZA")
                    .prefix_separator("__")
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
                config::Environment::with_prefix("PLAZA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Minimal configuration for the given public URL, every other section defaulted.
    #[must_use]
    pub fn for_url(url: &str) -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                url: url.to_string(),
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
            },
            federation: FederationConfig::default(),
            processing: ProcessingConfig::default(),
            timeline: TimelineConfig::default(),
            media: MediaConfig::default(),
            accounts: AccountsConfig::default(),
        }
    }
}
