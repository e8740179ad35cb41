//! Error types for the reactive layer

use thiserror::Error;

/// Errors raised by lifecycle-guarded operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// The addressed object was disposed
    #[error("{uri} has been disposed")]
    Disposed { uri: String },
}

/// Result type using ReactiveError
pub type Result<T> = std::result::Result<T, ReactiveError>;
