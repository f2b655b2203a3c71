//! Infrastructure layer: HTTP transport, on-disk cache, parsing, configuration
//! and logging.

pub mod config;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod parsing_error;
pub mod resource_cache;

// Re-export commonly used items
pub use config::{AppConfig, ConfigError};
pub use http_client::{HttpClient, HttpClientConfig};
pub use logging::init_logging_with_config;
pub use parsing::{FeedNormalizer, FeedOptions, NormalizeError, ParsingError, ParsingResult};
pub use resource_cache::{CacheError, ResourceCache};
