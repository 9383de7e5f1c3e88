//! Error types for recordlog-core

use thiserror::Error;

/// Errors raised while encoding or decoding a fixed-size record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Custom label does not fit its fixed-width field; nothing was encoded
    #[error("Custom label {label:?} is {len} code units long, limit is {max}")]
    LabelTooLong { label: String, len: usize, max: usize },

    /// Field widths did not add up to the record size
    #[error("Encoded record is {actual} bytes, expected {expected}")]
    LayoutMismatch { expected: usize, actual: usize },

    /// Block handed to the decoder has the wrong length
    #[error("Record block is {actual} bytes, expected {expected}")]
    WrongBlockSize { expected: usize, actual: usize },

    #[error("Unknown record kind byte: {0}")]
    UnknownKind(u8),

    #[error("Unknown level byte: {0}")]
    UnknownLevel(u8),
}

impl CodecError {
    /// Whether the error points at damaged data rather than a bad input record
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::UnknownKind(_) | Self::UnknownLevel(_) | Self::WrongBlockSize { .. }
        )
    }
}
