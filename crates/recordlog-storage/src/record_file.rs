//! Append-only file of fixed-size records
//!
//! The file is a raw concatenation of [`RECORD_SIZE`] blocks with no header
//! or framing, so record `n` starts at byte `n * RECORD_SIZE`.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use recordlog_core::{RECORD_SIZE, Record, RecordBlock, decode_slice};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;
use tracing::{debug, instrument, trace};

use crate::RecordStore;
use crate::append::append_bytes;
use crate::error::StorageError;

/// Configuration for a record file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordFileConfig {
    /// Whether to sync each append to disk
    pub sync_on_write: bool,
    /// Write attempts before a transient failure is reported
    pub max_append_attempts: u32,
}

impl Default for RecordFileConfig {
    fn default() -> Self {
        Self {
            sync_on_write: false,
            max_append_attempts: 10,
        }
    }
}

/// File-backed [`RecordStore`]
///
/// Appends are serialized by a per-file lock. Reads open their own handle
/// and may run alongside appends; a record that is not completely written
/// yet reads as out of range.
#[derive(Debug)]
pub struct RecordFile {
    path: PathBuf,
    config: RecordFileConfig,
    write_lock: Mutex<()>,
}

impl RecordFile {
    /// Create a handle for the file at `path`
    ///
    /// Nothing is touched on disk until the first append.
    pub fn new(path: impl Into<PathBuf>, config: RecordFileConfig) -> Self {
        Self {
            path: path.into(),
            config,
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &RecordFileConfig {
        &self.config
    }

    async fn open_for_read(&self) -> Result<File, StorageError> {
        File::open(&self.path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::not_found(self.path.display().to_string())
            } else {
                e.into()
            }
        })
    }

    /// Number of complete records in an open file
    async fn entries_in(&self, file: &File) -> Result<u32, StorageError> {
        let len = file.metadata().await?.len();
        Ok((len / RECORD_SIZE as u64).min(u32::MAX as u64) as u32)
    }
}

#[async_trait]
impl RecordStore for RecordFile {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn append(&self, block: &RecordBlock) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        append_bytes(
            &self.path,
            block,
            self.config.max_append_attempts,
            self.config.sync_on_write,
        )
        .await?;
        trace!("Appended record");
        Ok(())
    }

    async fn read_at(&self, index: u32) -> Result<RecordBlock, StorageError> {
        let mut file = self.open_for_read().await?;
        let entries = self.entries_in(&file).await?;
        if index >= entries {
            return Err(StorageError::OutOfRange { index, entries });
        }

        file.seek(SeekFrom::Start(index as u64 * RECORD_SIZE as u64))
            .await?;
        let mut block = [0u8; RECORD_SIZE];
        match file.read_exact(&mut block).await {
            Ok(_) => Ok(block),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                Err(StorageError::OutOfRange { index, entries })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn count_entries(&self) -> Result<u32, StorageError> {
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::not_found(self.path.display().to_string())
            } else {
                e.into()
            }
        })?;

        let len = metadata.len();
        if len % RECORD_SIZE as u64 != 0 {
            return Err(StorageError::Corrupted {
                path: self.path.display().to_string(),
                len,
            });
        }
        Ok((len / RECORD_SIZE as u64).min(u32::MAX as u64) as u32)
    }

    /// Reads the whole range with a single seek
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn read_range(&self, start: u32, max: usize) -> Result<Vec<Record>, StorageError> {
        let mut file = self.open_for_read().await?;
        let entries = self.entries_in(&file).await?;
        if start >= entries {
            return Err(StorageError::OutOfRange {
                index: start,
                entries,
            });
        }

        let count = ((entries - start) as usize).min(max);
        file.seek(SeekFrom::Start(start as u64 * RECORD_SIZE as u64))
            .await?;
        let mut bytes = vec![0u8; count * RECORD_SIZE];
        file.read_exact(&mut bytes).await?;

        let records = bytes
            .chunks_exact(RECORD_SIZE)
            .map(decode_slice)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(start, count = records.len(), "Read record range");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordlog_core::{Level, RecordId, RecordKind, TimeStamp, encode};
    use tempfile::TempDir;

    fn record(id: u32) -> Record {
        Record::from_parts(
            RecordId::Assigned(id),
            RecordKind::Info,
            Level::Primary,
            format!("record {id}"),
            TimeStamp::new(1_000 + id, 0),
        )
    }

    fn create_test_file() -> (RecordFile, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let file = RecordFile::new(
            temp_dir.path().join("session.rec"),
            RecordFileConfig::default(),
        );
        (file, temp_dir)
    }

    #[tokio::test]
    async fn test_append_and_read() {
        let (file, _temp) = create_test_file();

        file.append(&encode(&record(1)).unwrap()).await.unwrap();
        file.append(&encode(&record(2)).unwrap()).await.unwrap();

        assert_eq!(file.count_entries().await.unwrap(), 2);
        assert_eq!(file.read_record(1).await.unwrap(), record(2));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let (file, _temp) = create_test_file();

        assert!(matches!(
            file.count_entries().await,
            Err(StorageError::NotFound(_))
        ));
        assert!(file.read_at(0).await.unwrap_err().is_missing());
    }

    #[tokio::test]
    async fn test_read_past_end_is_out_of_range() {
        let (file, _temp) = create_test_file();
        file.append(&encode(&record(1)).unwrap()).await.unwrap();

        assert!(matches!(
            file.read_at(1).await,
            Err(StorageError::OutOfRange {
                index: 1,
                entries: 1
            })
        ));
    }

    #[tokio::test]
    async fn test_append_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("19_10_26").join("session.rec");
        let file = RecordFile::new(&path, RecordFileConfig::default());

        file.append(&encode(&record(1)).unwrap()).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_partial_trailing_record() {
        let (file, _temp) = create_test_file();
        file.append(&encode(&record(1)).unwrap()).await.unwrap();

        let mut raw = tokio::fs::OpenOptions::new()
            .append(true)
            .open(file.path())
            .await
            .unwrap();
        tokio::io::AsyncWriteExt::write_all(&mut raw, &[1, 2, 3])
            .await
            .unwrap();

        assert!(matches!(
            file.count_entries().await,
            Err(StorageError::Corrupted { len: 515, .. })
        ));
        // The half-written record is not readable, the complete one still is
        assert!(file.read_at(1).await.unwrap_err().is_missing());
        assert_eq!(file.read_record(0).await.unwrap(), record(1));
    }

    #[tokio::test]
    async fn test_read_range_caps_at_end() {
        let (file, _temp) = create_test_file();
        for id in 1..=5 {
            file.append(&encode(&record(id)).unwrap()).await.unwrap();
        }

        let records = file.read_range(3, 10).await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RecordId::Assigned(4), RecordId::Assigned(5)]);

        assert_eq!(file.read_range(0, 2).await.unwrap().len(), 2);
        assert!(file.read_range(5, 1).await.unwrap_err().is_missing());
    }
}
