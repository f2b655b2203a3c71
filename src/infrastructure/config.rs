//! Configuration infrastructure
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `HARVESTER__SECTION__KEY` environment variables.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::listing::page_count;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub listing: ListingConfig,
    pub http: HttpConfig,
    pub workers: WorkerConfig,
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Where the shop directory lives and how it is paged
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    pub base_url: String,
    /// Total number of shops the directory advertises
    pub shop_count: u32,
    /// Shops per listing page
    pub page_size: u32,
    /// Fetch all listing pages through the worker pool instead of one by one
    pub parallel_discovery: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_requests_per_second: u32,
    pub max_redirects: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of concurrently running jobs
    pub max_concurrent: usize,
    /// Upper bound for a single fetch inside a job
    pub fetch_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Skip feeds of shops whose descriptor declares no EAN column
    pub require_identifier_column: bool,
    /// Treat the first feed record as a header row
    pub feed_has_header: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JSON lines file the normalized products are written to
    pub path: PathBuf,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,
    pub json_format: bool,
    pub console_output: bool,
    pub file_output: bool,
    /// Directory for the log file; platform data dir when unset
    pub log_dir: Option<PathBuf>,
    /// Module-specific log level filters (e.g., "reqwest": "info")
    pub module_filters: HashMap<String, String>,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::LISTING_BASE_URL.to_string(),
            shop_count: defaults::SHOP_COUNT,
            page_size: defaults::PAGE_SIZE,
            parallel_discovery: false,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::USER_AGENT.to_string(),
            timeout_seconds: defaults::HTTP_TIMEOUT_SECONDS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            max_redirects: defaults::MAX_REDIRECTS,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::MAX_CONCURRENT_JOBS,
            fetch_timeout_seconds: defaults::FETCH_TIMEOUT_SECONDS,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: defaults::cache_dir(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            require_identifier_column: true,
            feed_has_header: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(defaults::OUTPUT_FILE),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("reqwest".to_string(), "info".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("h2".to_string(), "warn".to_string());
                filters.insert("tokio".to_string(), "info".to_string());
                filters.insert("shopinfo_harvester".to_string(), "info".to_string());
                filters
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from `path` (or `harvester.toml` in the working
    /// directory if present) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(defaults::CONFIG_FILE_NAME).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        info!(
            "Configuration loaded: {} shops in pages of {}, {} workers, cache at {}",
            config.listing.shop_count,
            config.listing.page_size,
            config.workers.max_concurrent,
            config.cache.dir.display()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            (self.listing.page_size == 0, "listing.page_size must be greater than 0"),
            (
                page_count(self.listing.shop_count, self.listing.page_size).is_none(),
                "listing.shop_count is too large for listing.page_size",
            ),
            (self.workers.max_concurrent == 0, "workers.max_concurrent must be greater than 0"),
            (
                self.workers.fetch_timeout_seconds == 0,
                "workers.fetch_timeout_seconds must be greater than 0",
            ),
            (self.http.timeout_seconds == 0, "http.timeout_seconds must be greater than 0"),
            (
                self.http.max_requests_per_second == 0,
                "http.max_requests_per_second must be greater than 0",
            ),
        ];

        match checks.into_iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(ConfigError::Validation {
                message: message.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Default configuration values
pub mod defaults {
    use std::path::PathBuf;

    pub const CONFIG_FILE_NAME: &str = "harvester";
    pub const ENV_PREFIX: &str = "HARVESTER";

    pub const LISTING_BASE_URL: &str = crate::domain::listing::DEFAULT_LISTING_BASE;
    /// Shop count the directory advertised when last checked
    pub const SHOP_COUNT: u32 = 4633;
    pub const PAGE_SIZE: u32 = 50;

    pub const USER_AGENT: &str = "shopinfo-harvester/0.1";
    pub const HTTP_TIMEOUT_SECONDS: u64 = 30;
    pub const MAX_REQUESTS_PER_SECOND: u32 = 20;
    pub const MAX_REDIRECTS: usize = 10;

    pub const MAX_CONCURRENT_JOBS: usize = 10;
    pub const FETCH_TIMEOUT_SECONDS: u64 = 10;

    pub const OUTPUT_FILE: &str = "products.jsonl";

    pub const LOG_LEVEL: &str = "info";

    const APP_DIR_NAME: &str = "shopinfo-harvester";

    pub fn cache_dir() -> PathBuf {
        dirs::cache_dir().map_or_else(|| PathBuf::from("cache"), |dir| dir.join(APP_DIR_NAME))
    }

    pub fn log_dir() -> PathBuf {
        dirs::data_local_dir().map_or_else(|| PathBuf::from("logs"), |dir| dir.join(APP_DIR_NAME).join("logs"))
    }
}
