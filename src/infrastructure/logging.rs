//! Logging system configuration and initialization
//!
//! Console and file output, each optional, with an `EnvFilter` that keeps
//! HTTP and runtime internals quiet unless `trace` is requested. `RUST_LOG`
//! overrides the configured filter entirely.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use once_cell::sync::Lazy;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

pub use crate::infrastructure::config::LoggingConfig;
use crate::infrastructure::config::defaults;

pub const LOG_FILE_NAME: &str = "harvester.log";

// Keeps the non-blocking file writers alive for the whole process.
static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Local wall-clock timestamps with milliseconds
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
    }
}

/// Directory the log file is written to.
pub fn log_directory(config: &LoggingConfig) -> PathBuf {
    config.log_dir.clone().unwrap_or_else(defaults::log_dir)
}

/// Initialize logging with custom configuration
///
/// ```bash
/// # Show request-level HTTP details
/// RUST_LOG="debug,reqwest=debug,hyper=debug" shopinfo-harvester
/// ```
pub fn init_logging_with_config(config: LoggingConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(&config)?,
    };

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.file_output {
        let log_dir = log_directory(&config);
        layers.push(file_layer(&log_dir, config.json_format)?);
    }

    if config.console_output {
        let console_layer = fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(LocalTimeFormatter)
            .with_target(false);
        layers.push(if config.json_format {
            console_layer.json().boxed()
        } else {
            console_layer.boxed()
        });
    }

    Registry::default()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::debug!("Logging initialized (level: {})", config.level);
    Ok(())
}

/// Configured level plus per-module directives.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let mut filter = EnvFilter::try_new(&config.level)
        .with_context(|| format!("Invalid log level: {}", config.level))?;

    if !config.level.eq_ignore_ascii_case("trace") {
        for (module, level) in &config.module_filters {
            let directive = format!("{module}={level}")
                .parse()
                .with_context(|| format!("Invalid log filter for {module}: {level}"))?;
            filter = filter.add_directive(directive);
        }
    }

    Ok(filter)
}

fn file_layer(log_dir: &Path, json_format: bool) -> Result<BoxedLayer> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = rolling::never(log_dir, LOG_FILE_NAME);
    let (file_writer, file_guard) = non_blocking(file_appender);
    LOG_GUARDS
        .lock()
        .map_err(|_| anyhow!("Log guard registry poisoned"))?
        .push(file_guard);

    let layer = fmt::Layer::new()
        .with_writer(file_writer)
        .with_timer(LocalTimeFormatter)
        .with_ansi(false);

    Ok(if json_format {
        layer
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        layer.with_target(false).boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_builds() {
        assert!(build_filter(&LoggingConfig::default()).is_ok());
    }

    #[test]
    fn bad_level_is_reported() {
        let config = LoggingConfig {
            level: "loud=[".to_string(),
            ..LoggingConfig::default()
        };
        assert!(build_filter(&config).is_err());
    }

    #[test]
    fn explicit_log_dir_wins() {
        let config = LoggingConfig {
            log_dir: Some(PathBuf::from("/tmp/harvester-logs")),
            ..LoggingConfig::default()
        };
        assert_eq!(log_directory(&config), PathBuf::from("/tmp/harvester-logs"));
    }

    #[test]
    fn file_layer_creates_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let log_dir = dir.path().join("nested").join("logs");
        assert!(file_layer(&log_dir, false).is_ok());
        assert!(log_dir.is_dir());
    }
}
