//! File-tree merger.
//!
//! Folds pending `CreateFile` steps into the virtual file tree. The walk
//! creates intermediate folders on demand and overwrites the content of an
//! existing file node in place, so re-creating a path never duplicates it.

use tracing::{debug, warn};

use crate::file::FileItem;
use crate::step::{BuildStep, StepStatus};

/// Result of a merge pass that applied at least one step.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The rebuilt root-level file sequence
    pub files: Vec<FileItem>,
    /// The input steps, all marked `completed`
    pub steps: Vec<BuildStep>,
    /// Number of steps that changed the tree
    pub applied: usize,
}

/// Apply every pending file-creating step to `files`.
///
/// Returns `None` when no step qualified, so callers can skip a redundant
/// state update. Otherwise every input step, not only the applied ones, is
/// marked `completed` in the outcome.
pub fn apply_pending_steps(steps: &[BuildStep], files: &[FileItem]) -> Option<MergeOutcome> {
    let mut tree = files.to_vec();
    let mut applied = 0;

    for step in steps
        .iter()
        .filter(|s| s.is_pending() && s.step_type.is_structural())
    {
        let segments = step.path.as_deref().map(path_segments).unwrap_or_default();
        let Some((name, parents)) = segments.split_last() else {
            continue;
        };

        let content = step.code.clone().unwrap_or_default();
        match insert_file(&mut tree, parents, name, content) {
            Ok(()) => applied += 1,
            Err(conflict) => warn!(
                step = step.id,
                path = %conflict,
                "Skipping step, path conflicts with an existing node"
            ),
        }
    }

    if applied == 0 {
        return None;
    }

    debug!("Merged {} file step(s) into the tree", applied);

    let steps = steps
        .iter()
        .cloned()
        .map(|mut s| {
            s.status = StepStatus::Completed;
            s
        })
        .collect();

    Some(MergeOutcome {
        files: tree,
        steps,
        applied,
    })
}

/// Split a virtual path into its non-empty segments.
pub fn path_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Canonical absolute form of a virtual path (`src/a.txt` -> `/src/a.txt`).
pub fn normalize_path(path: &str) -> String {
    path_segments(path)
        .iter()
        .map(|s| format!("/{}", s))
        .collect()
}

// On conflict returns the accumulated path of the offending node.
fn insert_file(
    root: &mut Vec<FileItem>,
    parents: &[&str],
    name: &str,
    content: String,
) -> Result<(), String> {
    let mut level = root;
    let mut current = String::new();

    for segment in parents {
        current.push('/');
        current.push_str(segment);

        let idx = match level.iter().position(|n| n.path == current) {
            Some(idx) if level[idx].is_folder() => idx,
            Some(_) => return Err(current),
            None => {
                level.push(FileItem::folder(*segment, current.clone()));
                level.len() - 1
            }
        };
        level = level[idx].children.get_or_insert_with(Vec::new);
    }

    current.push('/');
    current.push_str(name);

    match level.iter().position(|n| n.path == current) {
        Some(idx) if level[idx].is_file() => level[idx].content = Some(content),
        Some(_) => return Err(current),
        None => level.push(FileItem::file(name, current, content)),
    }

    Ok(())
}
