//! Build session aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::file::FileItem;
use crate::step::{BuildStep, StepStatus};

/// Unique identifier for a build session
pub type SessionId = String;

/// Lifecycle status of a build session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created, waiting for the first batch of steps
    Initializing,
    /// Steps are known and being materialized
    Building,
    /// All generation finished and the file tree is complete
    Completed,
    /// The initial batch could not be obtained
    Failed,
    /// Cancelled by the user
    Cancelled,
}

impl SessionStatus {
    /// Terminal states accept no further build mutations.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Building => "building",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Session metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionMetadata {
    pub environment: String,
    pub version: String,
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl SessionMetadata {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            user_id: None,
            session_id: None,
        }
    }
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self::new("development")
    }
}

/// One prompt's generation lifecycle, its steps and the resulting files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildSession {
    pub id: SessionId,
    pub prompt: String,
    pub status: SessionStatus,
    /// Share of steps with `completed` status, as a percentage
    pub progress: u8,
    pub steps: Vec<BuildStep>,
    pub files: Vec<FileItem>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    pub metadata: SessionMetadata,
}

impl BuildSession {
    /// Create a new session with no steps or files.
    pub fn new(prompt: impl Into<String>, metadata: SessionMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prompt: prompt.into(),
            status: SessionStatus::Initializing,
            progress: 0,
            steps: Vec::new(),
            files: Vec::new(),
            created_at: now,
            updated_at: now,
            metadata,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Refresh `updated_at` and recompute `progress` from step statuses.
    pub fn touch(&mut self) {
        self.progress = completion_percent(&self.steps);
        self.updated_at = Utc::now();
    }
}

/// Rounded percentage of steps whose status is `completed`.
pub fn completion_percent(steps: &[BuildStep]) -> u8 {
    if steps.is_empty() {
        return 0;
    }
    let done = steps
        .iter()
        .filter(|s| s.status == StepStatus::Completed)
        .count();
    ((done as f64 * 100.0) / steps.len() as f64).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::StepType;

    #[test]
    fn test_session_creation() {
        let session = BuildSession::new("a todo app", SessionMetadata::default());
        assert!(session.is_active());
        assert_eq!(session.status, SessionStatus::Initializing);
        assert!(uuid::Uuid::parse_str(&session.id).is_ok());
        assert_eq!(session.created_at, session.updated_at);
        assert!(session.steps.is_empty());
    }

    #[test]
    fn test_terminal_states() {
        assert!(SessionStatus::Cancelled.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(!SessionStatus::Building.is_terminal());
    }

    #[test]
    fn test_completion_percent() {
        let steps = vec![
            BuildStep::new(0, StepType::CreateFile, "a", "a").with_status(StepStatus::Completed),
            BuildStep::new(1, StepType::CreateFile, "b", "b"),
            BuildStep::new(2, StepType::CreateFile, "c", "c"),
        ];
        assert_eq!(completion_percent(&steps), 33);
        assert_eq!(completion_percent(&[]), 0);
    }

    #[test]
    fn test_wire_names() {
        let session = BuildSession::new("p", SessionMetadata::new("test"));
        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("createdAt").is_some());
        assert_eq!(json["status"], "initializing");
        assert_eq!(json["metadata"]["environment"], "test");
    }
}
