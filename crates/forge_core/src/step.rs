//! Build step definitions.
//!
//! A build step is the typed form of one parsed artifact or action. Steps are
//! kept in an ordered `Vec`; the order is the execution and display order.

use serde::{Deserialize, Serialize};

/// Step identifier, monotonically assigned within one parse call or session.
pub type StepId = u64;

/// Kind of work a step represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    CreateFile,
    CreateFolder,
    EditFile,
    DeleteFile,
    RunScript,
    InstallDependency,
    ConfigureEnvironment,
    Deploy,
    Test,
    Build,
}

impl StepType {
    /// Whether this step type alters the virtual file tree when merged.
    ///
    /// Only file creation is structural for now; folder and script steps are
    /// display-only.
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::CreateFile)
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CreateFile => "create_file",
            Self::CreateFolder => "create_folder",
            Self::EditFile => "edit_file",
            Self::DeleteFile => "delete_file",
            Self::RunScript => "run_script",
            Self::InstallDependency => "install_dependency",
            Self::ConfigureEnvironment => "configure_environment",
            Self::Deploy => "deploy",
            Self::Test => "test",
            Self::Build => "build",
        };
        write!(f, "{}", s)
    }
}

/// Status of a single step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

/// A typed build step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildStep {
    pub id: StepId,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub status: StepStatus,
    /// Slash-delimited virtual path for file and folder steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// File contents or shell command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Cosmetic completion indicator (0-100), independent of `status`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl BuildStep {
    /// Create a pending step with no path or payload.
    pub fn new(
        id: StepId,
        step_type: StepType,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            step_type,
            status: StepStatus::Pending,
            path: None,
            code: None,
            progress: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: StepStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == StepStatus::Pending
    }
}

/// A step that has not been given an id yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewStep {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl NewStep {
    pub fn new(step_type: StepType, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            step_type,
            status: StepStatus::Pending,
            path: None,
            code: None,
            progress: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Assign an id, producing a full step.
    pub fn into_step(self, id: StepId) -> BuildStep {
        BuildStep {
            id,
            title: self.title,
            description: self.description,
            step_type: self.step_type,
            status: self.status,
            path: self.path,
            code: self.code,
            progress: self.progress,
        }
    }
}

/// Partial update applied by `update_step`. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub step_type: Option<StepType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StepStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
}

impl StepPatch {
    pub fn status(status: StepStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Apply this patch to a step in place.
    pub fn apply(&self, step: &mut BuildStep) {
        if let Some(ref title) = self.title {
            step.title = title.clone();
        }
        if let Some(ref description) = self.description {
            step.description = description.clone();
        }
        if let Some(step_type) = self.step_type {
            step.step_type = step_type;
        }
        if let Some(status) = self.status {
            step.status = status;
        }
        if let Some(ref path) = self.path {
            step.path = Some(path.clone());
        }
        if let Some(ref code) = self.code {
            step.code = Some(code.clone());
        }
        if let Some(progress) = self.progress {
            step.progress = Some(progress.min(100));
        }
    }
}
