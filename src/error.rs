//! Error types for the PDF distribution library

use std::fmt;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the PDF distribution library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or malformed input, disallowed file type, traversal attempt
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Document or log file absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Source bytes are not a usable PDF
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// General error
    #[error("{0}")]
    General(String),
}

/// Machine-distinguishable error category reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    NotFound,
    InvalidDocument,
    InternalError,
}

impl ErrorKind {
    /// Stable snake_case name used in error payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidDocument => "invalid_document",
            ErrorKind::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidDocument(_) => ErrorKind::InvalidDocument,
            Error::Pdf(_) | Error::Io(_) | Error::Json(_) | Error::General(_) => {
                ErrorKind::InternalError
            }
        }
    }
}
