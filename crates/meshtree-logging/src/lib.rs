//! Structured logging setup for meshtree
//!
//! Every crate in the workspace logs through `tracing`. This crate builds the
//! global subscriber from a [`LogConfig`]:
//!
//! - **Console**: JSONL by default, or pretty human-readable output
//! - **File**: JSONL frame log, optionally rotated via tracing-appender
//! - **Filtering**: `RUST_LOG` wins, otherwise the configured level plus
//!   per-target overrides
//!
//! # Quick Start
//!
//! ```ignore
//! use meshtree_logging::{LogConfig, SubscriberBuilder};
//!
//! // Development mode with pretty human-readable output
//! let _guard = SubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```
//!
//! Keep the returned guard alive while logging to a file; dropping it flushes
//! and stops the background writer.

pub mod config;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LogError {
    /// A level string could not be parsed
    #[error("Invalid log level '{0}'")]
    InvalidLevel(String),

    /// The log directory or file could not be created
    #[error("Log file I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The rolling appender rejected its configuration
    #[error("Rolling appender error: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    /// A global subscriber is already installed
    #[error("Subscriber already initialized: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

type Base = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Base> + Send + Sync>;

/// Builder for configuring and initializing the meshtree logging subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// for human-readable pretty output during development.
#[derive(Debug, Default)]
pub struct SubscriberBuilder {
    config: LogConfig,
}

impl SubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Use pretty console output instead of JSONL
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.config.console.pretty = pretty;
        self.config.console.ansi = pretty;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Initialize the subscriber globally
    ///
    /// Failures are reported on stderr and leave logging disabled; use
    /// [`try_init`](Self::try_init) to handle them.
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: failed to initialize logging: {e}");
                None
            }
        }
    }

    /// Try to initialize the subscriber globally
    ///
    /// Returns the file writer guard when file output is configured.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LogError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.config.directives()));

        let mut layers: Vec<BoxedLayer> = Vec::new();
        if let Some(layer) = self.console_layer()? {
            layers.push(layer);
        }

        let mut guard = None;
        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = file_writer(file_config)?;
            guard = Some(file_guard);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(self.config.jsonl.include_current_span)
                    .with_span_list(self.config.jsonl.include_spans)
                    .flatten_event(self.config.jsonl.flatten_events)
                    .with_file(self.config.jsonl.include_location)
                    .with_line_number(self.config.jsonl.include_location)
                    .with_writer(writer)
                    .boxed(),
            );
        }

        Registry::default().with(env_filter).with(layers).try_init()?;
        Ok(guard)
    }

    fn console_layer(&self) -> Result<Option<BoxedLayer>, LogError> {
        let console = &self.config.console;
        if !console.enabled {
            return Ok(None);
        }

        let level = console
            .level
            .as_deref()
            .map(|level| {
                level
                    .parse::<LevelFilter>()
                    .map_err(|_| LogError::InvalidLevel(level.to_string()))
            })
            .transpose()?
            .unwrap_or(LevelFilter::TRACE);

        let layer = if console.pretty {
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_ansi(console.ansi)
                .with_target(true)
                .with_filter(level)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(self.config.jsonl.include_current_span)
                .with_span_list(self.config.jsonl.include_spans)
                .flatten_event(self.config.jsonl.flatten_events)
                .with_filter(level)
                .boxed()
        };
        Ok(Some(layer))
    }
}

/// Create the file writer; truncates for `Never` rotation, appends otherwise
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogError> {
    fs::create_dir_all(&config.directory)?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.jsonl", config.prefix));
            return Ok(tracing_appender::non_blocking(File::create(path)?));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.clone())
        .filename_suffix("jsonl");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }
    let appender = builder.build(&config.directory)?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() -> Option<WorkerGuard> {
    SubscriberBuilder::new().init()
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> Option<WorkerGuard> {
    SubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for testing (minimal output)
///
/// Safe to call from many tests; only the first call installs a subscriber.
pub fn init_testing() {
    let _ = SubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creation() {
        let builder = SubscriberBuilder::new();
        assert_eq!(builder.config.default_level, "info");
        assert!(!builder.config.console.pretty); // JSONL by default
    }

    #[test]
    fn test_builder_with_config() {
        let builder = SubscriberBuilder::new().with_config(LogConfig::development());
        assert_eq!(builder.config.default_level, "debug");
        assert!(builder.config.console.pretty);
    }

    #[test]
    fn test_builder_toggles() {
        let builder = SubscriberBuilder::new()
            .with_level("trace")
            .with_console(false)
            .with_pretty(true);
        assert_eq!(builder.config.default_level, "trace");
        assert!(!builder.config.console.enabled);
        assert!(builder.config.console.ansi);
    }

    #[test]
    fn test_invalid_console_level() {
        let mut config = LogConfig::testing();
        config.console.level = Some("loud".to_string());
        let builder = SubscriberBuilder::new().with_config(config);
        assert!(matches!(
            builder.console_layer(),
            Err(LogError::InvalidLevel(level)) if level == "loud"
        ));
    }

    #[test]
    fn test_disabled_console_has_no_layer() {
        let builder = SubscriberBuilder::new().with_console(false);
        assert!(builder.console_layer().unwrap().is_none());
    }

    #[test]
    fn test_file_writer_never_rotation() {
        let dir = std::env::temp_dir().join(format!("meshtree-log-{}", std::process::id()));
        let config = FileConfig {
            directory: dir.clone(),
            prefix: "frames".to_string(),
            ..FileConfig::default()
        };
        let (_writer, guard) = file_writer(&config).unwrap();
        drop(guard);
        assert!(dir.join("frames.jsonl").exists());
        let _ = fs::remove_dir_all(dir);
    }
}
