//! Diagnostics setup for processes hosting a recordlog store
//!
//! The store itself reports through `tracing`. This crate installs a
//! subscriber for those events: JSONL or pretty console output and an
//! optional JSONL file, filtered by `RUST_LOG` or the configured level.
//!
//! # Quick Start
//!
//! ```ignore
//! use recordlog_logging::{LogConfig, RecordlogSubscriberBuilder};
//!
//! // JSONL to console
//! let _guard = RecordlogSubscriberBuilder::new().init();
//!
//! // Pretty output while developing
//! let _guard = RecordlogSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```

pub mod config;
pub mod error;
pub mod layers;

pub use config::{ConsoleConfig, FileConfig, JsonlConfig, LogConfig, RotationStrategy};
pub use error::LoggingError;
pub use layers::BoxedLayer;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Builder for configuring and initializing the recordlog subscriber
///
/// By default, console output uses JSONL format. Use `LogConfig::development()`
/// for human-readable pretty output during development.
#[derive(Debug, Clone, Default)]
pub struct RecordlogSubscriberBuilder {
    config: LogConfig,
}

impl RecordlogSubscriberBuilder {
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

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Filter from `RUST_LOG`, falling back to the configured directives
    pub fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        EnvFilter::try_new(self.config.directives()).map_err(|e| LoggingError::Filter(e.to_string()))
    }

    /// Output layers for the configuration, plus the file writer guard
    pub fn build_layers(&self) -> Result<(Vec<BoxedLayer>, Option<WorkerGuard>), LoggingError> {
        let mut layers = Vec::new();
        let mut guard = None;

        if self.config.console.enabled {
            layers.push(layers::console_layer(
                &self.config.console,
                &self.config.jsonl,
            ));
        }
        if let Some(file) = &self.config.file {
            let (writer, file_guard) = layers::file_writer(file)?;
            layers.push(layers::jsonl_layer(writer, &self.config.jsonl));
            guard = Some(file_guard);
        }

        Ok((layers, guard))
    }

    /// Try to initialize the subscriber globally
    ///
    /// Keep the returned guard alive while file output is wanted.
    ///
    /// # Errors
    ///
    /// Fails if a global subscriber is already set, the filter does not
    /// parse, or the log directory cannot be created.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let filter = self.env_filter()?;
        let (layers, guard) = self.build_layers()?;

        Registry::default()
            .with(layers)
            .with(filter)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
        Ok(guard)
    }

    /// Initialize the subscriber globally, reporting failure on stderr
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {e}");
                None
            }
        }
    }
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() -> Option<WorkerGuard> {
    RecordlogSubscriberBuilder::new().init()
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> Option<WorkerGuard> {
    RecordlogSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for testing (warnings only)
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_testing() {
    let _ = RecordlogSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creation() {
        let builder = RecordlogSubscriberBuilder::new();
        assert_eq!(builder.config().default_level, "info");
        assert!(!builder.config().console.pretty); // JSONL by default
    }

    #[test]
    fn test_builder_with_config() {
        let builder = RecordlogSubscriberBuilder::new().with_config(LogConfig::development());
        assert_eq!(builder.config().default_level, "debug");
        assert!(builder.config().console.pretty);
    }

    #[test]
    fn test_builder_with_level() {
        let builder = RecordlogSubscriberBuilder::new().with_level("trace");
        assert_eq!(builder.config().default_level, "trace");
    }

    #[test]
    fn test_layers_follow_config() {
        let (layers, guard) = RecordlogSubscriberBuilder::new()
            .with_console(false)
            .build_layers()
            .unwrap();
        assert!(layers.is_empty());
        assert!(guard.is_none());

        let (layers, _) = RecordlogSubscriberBuilder::new().build_layers().unwrap();
        assert_eq!(layers.len(), 1);
    }

    #[test]
    fn test_invalid_level_is_reported() {
        let builder = RecordlogSubscriberBuilder::new().with_level("not a level!!");
        if std::env::var("RUST_LOG").is_err() {
            assert!(matches!(builder.env_filter(), Err(LoggingError::Filter(_))));
        }
    }
}
