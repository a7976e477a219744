//! Error types for tablekv operations.

use crate::backend::BackendError;

/// Error type for store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The requested key (or destroy location) does not exist.
    NotFound,

    /// Table creation was requested with `error_if_exists` and the table
    /// already exists.
    AlreadyExists(String),

    /// An unrecognized failure from a backend call, propagated unchanged.
    Backend(String),

    /// Attribute encoding or decoding errors.
    Encoding(String),

    /// A batch submission exceeded the configured retry budget while the
    /// backend kept reporting unprocessed items.
    RetriesExhausted(String),

    /// Invalid input or parameter errors.
    InvalidInput(String),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Bare "NotFound" matches what callers of the store interface
            // pattern-match on.
            Error::NotFound => write!(f, "NotFound"),
            Error::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            Error::Backend(msg) => write!(f, "Backend error: {}", msg),
            Error::Encoding(msg) => write!(f, "Encoding error: {}", msg),
            Error::RetriesExhausted(msg) => write!(f, "Retries exhausted: {}", msg),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl From<BackendError> for Error {
    fn from(err: BackendError) -> Self {
        Error::Backend(err.to_string())
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;
