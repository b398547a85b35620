//! Error types for the client module.

use thiserror::Error;

/// Result type alias for backend calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the build backend.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Simulated failure: {0}")]
    Simulated(String),
}

impl ClientError {
    /// HTTP status code, when the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
