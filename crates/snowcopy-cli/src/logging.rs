//! Logging setup for the snowcopy binary
//!
//! Console output goes to stderr so stdout stays clean for tables and JSON.
//! An optional daily-rolled JSON log file captures full span context.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for JSON log files; `None` disables the file layer
    pub log_dir: Option<PathBuf>,

    /// Whether to include file/line information in console logs
    pub include_location: bool,

    /// Filter used when `RUST_LOG` is not set
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            include_location: cfg!(debug_assertions),
            default_filter: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Console at `level` for the snowcopy crates, `warn` for dependencies
    pub fn with_level(level: &str) -> Self {
        Self {
            default_filter: format!(
                "warn,snowcopy={level},snowcopy_core={level},snowcopy_sync={level},snowcopy_drivers={level},snowcopy_driver_sqlite={level},snowcopy_driver_duckdb={level},snowcopy_driver_snowflake={level}"
            ),
            ..Default::default()
        }
    }

    pub fn with_log_dir(mut self, log_dir: Option<PathBuf>) -> Self {
        self.log_dir = log_dir;
        self
    }
}

/// Default location for JSON logs when `--log-dir` is not given
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("snowcopy")
        .join("logs")
}

/// Initialize the global subscriber
///
/// With a log directory the returned guard owns the file writer; records
/// still buffered are flushed when it drops, so hold it until exit.
pub fn init(config: LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    // RUST_LOG takes precedence over the configured filter
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let mut layers = Vec::new();
    let mut file_guard = None;

    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_writer(std::io::stderr)
        .compact()
        .with_filter(env_filter.clone())
        .boxed();
    layers.push(console_layer);

    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir)?;
        let file_appender = tracing_appender::rolling::daily(log_dir, "snowcopy.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        file_guard = Some(guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(env_filter)
            .boxed();
        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::debug!(
        log_dir = ?config.log_dir,
        filter = %config.default_filter,
        "Logging initialized"
    );
    Ok(file_guard)
}
