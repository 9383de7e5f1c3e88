//! # Recordlog Storage
//!
//! Record stores for recordlog channels.
//!
//! ## Features
//!
//! - **RecordStore trait**: Index-addressed store of fixed-size record blocks
//! - **RecordFile**: Append-only file implementation for production
//! - **InMemoryRecordStore**: In-memory implementation for testing
//! - **TextMirror**: Human-readable one-line-per-record mirror
//! - **RetentionSweep**: Background deletion of old record files
//!
//! ## Example
//!
//! ```rust,ignore
//! use recordlog_core::{IdAllocator, Level, Record, RecordKind};
//! use recordlog_storage::{RecordFile, RecordFileConfig, RecordStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let ids = IdAllocator::new();
//!     let file = RecordFile::new("logs/session.rec", RecordFileConfig::default());
//!
//!     let record = Record::new(RecordKind::Info, "started", Level::Primary, &ids);
//!     file.append_record(&record).await.unwrap();
//!
//!     assert_eq!(file.count_entries().await.unwrap(), 1);
//!     assert_eq!(file.read_record(0).await.unwrap(), record);
//! }
//! ```

mod append;
pub mod error;
pub mod memory;
pub mod record_file;
pub mod retention;
pub mod text_mirror;

// Re-exports
pub use error::StorageError;
pub use memory::InMemoryRecordStore;
pub use record_file::{RecordFile, RecordFileConfig};
pub use retention::{RetentionSweep, SweepReport};
pub use text_mirror::TextMirror;

use async_trait::async_trait;
use recordlog_core::{Record, RecordBlock, decode, encode};

/// Extension of binary record files
pub const RECORD_FILE_EXTENSION: &str = "rec";

/// Extension of text mirror files
pub const TEXT_FILE_EXTENSION: &str = "log";

/// Index-addressed store of fixed-size record blocks
///
/// Records are only ever appended. Index `n` is the `n`-th appended record,
/// which is not necessarily the record with id `n + 1`.
#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Append one encoded record
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails after the store's retries.
    async fn append(&self, block: &RecordBlock) -> Result<(), StorageError>;

    /// Read the block at `index`
    ///
    /// # Errors
    ///
    /// `NotFound` if the store does not exist yet, `OutOfRange` if no
    /// complete record exists at `index`.
    async fn read_at(&self, index: u32) -> Result<RecordBlock, StorageError>;

    /// Number of records in the store
    ///
    /// # Errors
    ///
    /// `Corrupted` if the underlying length is not a whole number of records.
    async fn count_entries(&self) -> Result<u32, StorageError>;

    /// Encode and append a record
    async fn append_record(&self, record: &Record) -> Result<(), StorageError> {
        let block = encode(record)?;
        self.append(&block).await
    }

    /// Read and decode the record at `index`
    async fn read_record(&self, index: u32) -> Result<Record, StorageError> {
        let block = self.read_at(index).await?;
        Ok(decode(&block)?)
    }

    /// Read up to `max` consecutive records starting at `start`
    ///
    /// # Errors
    ///
    /// `OutOfRange` if `start` itself is past the end.
    async fn read_range(&self, start: u32, max: usize) -> Result<Vec<Record>, StorageError> {
        let mut records = Vec::new();
        let mut index = start;
        while records.len() < max {
            match self.read_record(index).await {
                Ok(record) => records.push(record),
                Err(e) if e.is_missing() && !records.is_empty() => break,
                Err(e) => return Err(e),
            }
            index = match index.checked_add(1) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(records)
    }
}
