//! Error types for recordlog-storage
//!
//! Missing files and reads past the end are the recoverable "not found"
//! class; a file whose length is not a whole number of records is
//! corruption and is never repaired here.

use recordlog_core::CodecError;
use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// Store file does not exist (yet)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Read past the last complete record
    #[error("Record index {index} out of range ({entries} entries)")]
    OutOfRange { index: u32, entries: u32 },

    /// File length is not a multiple of the record size
    #[error("Corrupted record file {path}: length {len} is not a multiple of the record size")]
    Corrupted { path: String, len: u64 },

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl StorageError {
    /// Create a new NotFound error
    pub fn not_found(item: impl Into<String>) -> Self {
        Self::NotFound(item.into())
    }

    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Whether the requested data simply is not there (yet)
    ///
    /// Window scrolling treats these as a failed lookup, not as an error.
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::OutOfRange { .. })
    }
}
