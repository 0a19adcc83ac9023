//! Logging and metrics bootstrap.
//!
//! The core records through the `tracing` and `metrics` facades; embedding
//! applications that do not install their own subscriber or recorder can
//! call [`init_logging`] and [`register_metrics`] once at startup.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

/// Configuration for structured logging.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Whether to use JSON format (true) or text format (false)
    pub json_format: bool,
    /// The default log level if RUST_LOG is not set
    pub default_level: Level,
    /// Whether to include span events (enter/exit)
    pub include_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json_format: false,
            default_level: Level::INFO,
            include_spans: false,
        }
    }
}

impl LoggingConfig {
    /// JSON output for production.
    pub fn json() -> Self {
        Self {
            json_format: true,
            ..Default::default()
        }
    }

    /// Text output for development.
    pub fn text() -> Self {
        Self {
            json_format: false,
            ..Default::default()
        }
    }

    /// Sets the default log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Includes span enter/exit events in the output.
    pub fn with_spans(mut self) -> Self {
        self.include_spans = true;
        self
    }
}

/// Initializes the logging subsystem.
///
/// Call once at application startup; subsequent calls have no effect (the
/// subscriber is global).
pub fn init_logging(config: LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_level.to_string()));

    let span_events = if config.include_spans {
        FmtSpan::ENTER | FmtSpan::EXIT
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_span_events(span_events)
                .with_current_span(true)
                .with_target(true),
        );
        let _ = tracing::subscriber::set_global_default(subscriber);
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_span_events(span_events).with_target(true));
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// Registers metric descriptions with the installed recorder.
///
/// Optional; provides better documentation in Prometheus/Grafana.
///
/// # Metrics Registered
///
/// - `fgacache_cache_hits_total` - Check cache hits
/// - `fgacache_cache_misses_total` - Check cache misses
/// - `fgacache_flushed_writes_total` - Tuple writes confirmed by flush
/// - `fgacache_flushed_deletes_total` - Tuple deletes confirmed by flush
/// - `fgacache_flush_errors_total` - Failed flush batches
pub fn register_metrics() {
    metrics::describe_counter!(
        "fgacache_cache_hits_total",
        "Total number of check cache hits"
    );
    metrics::describe_counter!(
        "fgacache_cache_misses_total",
        "Total number of check cache misses"
    );
    metrics::describe_counter!(
        "fgacache_flushed_writes_total",
        "Total tuple writes confirmed by flush"
    );
    metrics::describe_counter!(
        "fgacache_flushed_deletes_total",
        "Total tuple deletes confirmed by flush"
    );
    metrics::describe_counter!(
        "fgacache_flush_errors_total",
        "Total number of failed flush batches"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(!config.json_format);
        assert_eq!(config.default_level, Level::INFO);
        assert!(!config.include_spans);
    }

    #[test]
    fn test_logging_config_builders() {
        let config = LoggingConfig::json().with_level(Level::DEBUG).with_spans();
        assert!(config.json_format);
        assert_eq!(config.default_level, Level::DEBUG);
        assert!(config.include_spans);

        assert!(!LoggingConfig::text().json_format);
    }

    #[test]
    fn test_register_metrics_is_idempotent() {
        // Describing metrics twice must not panic
        register_metrics();
        register_metrics();
    }
}
