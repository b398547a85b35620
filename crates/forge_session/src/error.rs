//! Error types for build sessions.

use thiserror::Error;

use forge_client::ClientError;
use forge_core::SessionStatus;

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors surfaced by the session machine and orchestrator.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No active build session")]
    NoActiveSession,

    #[error("Cannot {operation} while session is {status}")]
    InvalidState {
        status: SessionStatus,
        operation: String,
    },

    #[error("Failed to fetch template: {0}")]
    Template(String),

    #[error("Failed to generate build steps: {0}")]
    Generation(String),

    #[error("Backend error: {0}")]
    Client(#[from] ClientError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SessionError {
    /// Short machine-readable name used in error reports.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NoActiveSession => "NoActiveSession",
            Self::InvalidState { .. } => "InvalidState",
            Self::Template(_) => "TemplateError",
            Self::Generation(_) => "GenerationError",
            Self::Client(_) => "ClientError",
            Self::Config(_) => "ConfigError",
            Self::Io(_) => "IoError",
            Self::Toml(_) => "TomlError",
        }
    }
}
