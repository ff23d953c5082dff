//! Error types for surfel graph I/O.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for surfel graph I/O operations.
pub type IoResult<T> = Result<T, IoError>;

/// Errors that can occur while reading or writing a surfel graph file.
#[derive(Debug, Error)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was not found.
        path: PathBuf,
    },

    /// Invalid file content (parse error).
    #[error("invalid file content: {message}")]
    InvalidContent {
        /// Description of what was invalid.
        message: String,
    },

    /// An edge in the file references a node id that was never declared.
    #[error("edge references unknown surfel id {id}")]
    UnknownEdgeEndpoint {
        /// The undeclared id.
        id: String,
    },

    /// I/O error from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// String conversion error.
    #[error("string conversion error: {0}")]
    FromUtf8(#[from] std::string::FromUtf8Error),

    /// The reconstructed graph was rejected by the surfel layer.
    #[error(transparent)]
    Surfel(#[from] field_surfel::SurfelError),
}

impl IoError {
    /// Create an `InvalidContent` error with the given message.
    pub fn invalid_content(message: impl Into<String>) -> Self {
        Self::InvalidContent {
            message: message.into(),
        }
    }
}
