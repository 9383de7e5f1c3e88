//! Error types for recordlog-logging

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggingError {
    /// Log directory or file could not be created
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A global subscriber was already installed
    #[error("Subscriber already initialized: {0}")]
    AlreadyInitialized(String),

    /// Filter directives did not parse
    #[error("Invalid filter: {0}")]
    Filter(String),

    #[error("Invalid logging config: {0}")]
    Config(#[from] serde_json::Error),
}
