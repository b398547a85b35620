//! # forge_core
//!
//! Core build pipeline for SiteForge.
//!
//! This crate turns an LLM build response into ordered build steps and folds
//! those steps into an in-memory virtual file tree.
//!
//! # Architecture
//!
//! - **Parser**: tokenizes `boltArtifact`/`boltAction` tags and emits typed steps
//! - **Merge**: applies pending file steps to the tree with overwrite semantics
//! - **Session**: the build session aggregate that owns steps and files
//! - **Export**: sandbox mount structure and on-disk materialization
//!
//! # Example
//!
//! ```rust
//! use forge_core::{apply_pending_steps, find_node, parse_build_steps};
//!
//! let response = r#"<boltArtifact title="Site">
//!   <boltAction type="file" filePath="src/index.html"><h1>Hi</h1></boltAction>
//! </boltArtifact>"#;
//!
//! let steps = parse_build_steps(response);
//! let outcome = apply_pending_steps(&steps, &[]).expect("one file step");
//! let node = find_node(&outcome.files, "src/index.html").unwrap();
//! assert_eq!(node.content.as_deref(), Some("<h1>Hi</h1>"));
//! ```

pub mod error;
pub mod export;
pub mod file;
pub mod merge;
pub mod parser;
pub mod session;
pub mod step;

pub use error::{CoreError, CoreResult};
pub use export::{to_mount_tree, write_to_dir, MountEntry, MountFile, MountTree};
pub use file::{file_count, find_node, FileItem, FileKind, FilePatch, NewFile};
pub use merge::{apply_pending_steps, normalize_path, path_segments, MergeOutcome};
pub use parser::{parse_build_steps, unescape, SHELL_PREVIEW_CHARS, UNTITLED_ARTIFACT};
pub use session::{completion_percent, BuildSession, SessionId, SessionMetadata, SessionStatus};
pub use step::{BuildStep, NewStep, StepId, StepPatch, StepStatus, StepType};
