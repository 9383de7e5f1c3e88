//! Output layers for the recordlog subscriber
//!
//! Every layer is boxed over [`Registry`] so the builder can stack any
//! combination of them without a match arm per combination.

use std::fs::{self, File};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{Layer, Registry};

use crate::config::{ConsoleConfig, FileConfig, JsonlConfig, RotationStrategy};
use crate::error::LoggingError;

/// A type-erased layer over the base registry
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Console layer, pretty or JSONL
pub fn console_layer(console: &ConsoleConfig, jsonl: &JsonlConfig) -> BoxedLayer {
    if console.pretty {
        tracing_subscriber::fmt::layer()
            .with_ansi(console.ansi)
            .with_target(true)
            .boxed()
    } else {
        jsonl_layer(std::io::stdout, jsonl)
    }
}

/// JSONL layer writing to `writer`
pub fn jsonl_layer<W>(writer: W, jsonl: &JsonlConfig) -> BoxedLayer
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(jsonl.include_spans)
        .flatten_event(jsonl.flatten_events)
        .with_file(jsonl.include_location)
        .with_line_number(jsonl.include_location)
        .with_thread_ids(jsonl.include_thread_info)
        .with_thread_names(jsonl.include_thread_info)
        .with_writer(writer)
        .boxed()
}

/// Non-blocking writer for file output
///
/// Keep the returned guard alive for as long as events should reach the
/// file. `Never` truncates a single `<prefix>.log`; the other strategies
/// roll over by date.
pub fn file_writer(file: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    fs::create_dir_all(&file.directory)?;
    let rotation = match file.rotation {
        RotationStrategy::Never => {
            let path = file.directory.join(format!("{}.log", file.prefix));
            return Ok(tracing_appender::non_blocking(File::create(path)?));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };
    let appender = RollingFileAppender::new(rotation, &file.directory, &file.prefix);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_single_file_writer() {
        let temp = TempDir::new().unwrap();
        let config = FileConfig {
            directory: temp.path().join("diag"),
            prefix: "session".to_string(),
            rotation: RotationStrategy::Never,
        };

        let (_writer, _guard) = file_writer(&config).unwrap();
        assert!(temp.path().join("diag").join("session.log").exists());
    }

    #[test]
    fn test_rolling_writer_creates_directory() {
        let temp = TempDir::new().unwrap();
        let config = FileConfig {
            directory: temp.path().join("rolling"),
            ..FileConfig::default()
        };

        let (_writer, _guard) = file_writer(&config).unwrap();
        assert!(config.directory.is_dir());
    }
}
