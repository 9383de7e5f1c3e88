//! Human-readable mirror of a channel
//!
//! One line per record, never parsed back.

use std::path::{Path, PathBuf};

use recordlog_core::Record;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::append::append_bytes;
use crate::error::StorageError;

/// Write attempts per line
pub const TEXT_MIRROR_ATTEMPTS: u32 = 10;

/// Text file that receives one line per record
#[derive(Debug)]
pub struct TextMirror {
    path: PathBuf,
    date_time_format: String,
    write_lock: Mutex<()>,
}

impl TextMirror {
    /// Mirror records to `path`, formatting times with a chrono strftime pattern
    pub fn new(path: impl Into<PathBuf>, date_time_format: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            date_time_format: date_time_format.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format a record the way it will appear in the file
    pub fn format_line(&self, record: &Record) -> String {
        record.text_line(&self.date_time_format)
    }

    /// Append one record
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub async fn write_record(&self, record: &Record) -> Result<(), StorageError> {
        let line = self.format_line(record);
        self.write_line(&line).await
    }

    /// Append a raw line
    pub async fn write_line(&self, line: &str) -> Result<(), StorageError> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');

        let _guard = self.write_lock.lock().await;
        append_bytes(&self.path, &bytes, TEXT_MIRROR_ATTEMPTS, false).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordlog_core::{Level, RecordId, RecordKind, TimeStamp};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lines_are_appended() {
        let temp = TempDir::new().unwrap();
        let mirror = TextMirror::new(temp.path().join("day").join("session.log"), "%Y");

        let first = Record::from_parts(
            RecordId::Assigned(1),
            RecordKind::Success,
            Level::Primary,
            "connected",
            TimeStamp::new(0, 0),
        );
        mirror.write_record(&first).await.unwrap();
        mirror.write_record(&Record::internal("mirror ok")).await.unwrap();

        let text = tokio::fs::read_to_string(mirror.path()).await.unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1\tSUCCESS\t\t\t"));
        assert!(lines[0].ends_with("\tconnected"));
        assert!(lines[1].starts_with("\trecordlog\t\t"));
    }
}
