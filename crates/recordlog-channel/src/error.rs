//! Error types for recordlog-channel

use recordlog_core::CodecError;
use recordlog_storage::StorageError;
use thiserror::Error;

/// Errors that can occur in channel and hub operations
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Record rejected before anything was written
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// History operation on a channel without a record store
    #[error("Channel {0} does not support history browsing")]
    NotBrowsable(String),

    #[error("Invalid custom kind {label:?}: {reason}")]
    InvalidCustomKind { label: String, reason: String },

    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    #[error("Empty message for channel {0}")]
    EmptyMessage(String),

    #[error("Invalid settings: {0}")]
    Config(String),
}

impl ChannelError {
    pub fn invalid_custom_kind(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCustomKind {
            label: label.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(err: serde_json::Error) -> Self {
        ChannelError::Config(err.to_string())
    }
}
