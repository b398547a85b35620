//! Export of the virtual file tree.
//!
//! Two forms are supported: the nested mount structure consumed by the
//! preview sandbox, and a plain directory on the local filesystem.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::file::{FileItem, FileKind};

/// Mount structure keyed by node name.
pub type MountTree = BTreeMap<String, MountEntry>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MountFile {
    pub contents: String,
}

/// One entry of the mount structure: `{ file: { contents } }` or
/// `{ directory: { ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MountEntry {
    File { file: MountFile },
    Directory { directory: MountTree },
}

/// Convert the virtual tree into the sandbox mount structure.
pub fn to_mount_tree(files: &[FileItem]) -> MountTree {
    files
        .iter()
        .map(|node| (node.name.clone(), mount_entry(node)))
        .collect()
}

fn mount_entry(node: &FileItem) -> MountEntry {
    match node.kind {
        FileKind::Folder => MountEntry::Directory {
            directory: to_mount_tree(node.children()),
        },
        FileKind::File => MountEntry::File {
            file: MountFile {
                contents: node.content.clone().unwrap_or_default(),
            },
        },
    }
}

/// Write the virtual tree below `root`, returning the paths of written files.
///
/// Node names must be single, non-empty path components.
pub fn write_to_dir(files: &[FileItem], root: impl AsRef<Path>) -> CoreResult<Vec<PathBuf>> {
    let root = root.as_ref();
    fs::create_dir_all(root)?;

    let mut written = Vec::new();
    write_level(files, root, &mut written)?;

    debug!("Wrote {} file(s) to {:?}", written.len(), root);
    Ok(written)
}

fn write_level(files: &[FileItem], dir: &Path, written: &mut Vec<PathBuf>) -> CoreResult<()> {
    for node in files {
        validate_name(node)?;
        let target = dir.join(&node.name);

        match node.kind {
            FileKind::Folder => {
                fs::create_dir_all(&target)?;
                write_level(node.children(), &target, written)?;
            }
            FileKind::File => {
                fs::write(&target, node.content.as_deref().unwrap_or(""))?;
                written.push(target);
            }
        }
    }
    Ok(())
}

fn validate_name(node: &FileItem) -> CoreResult<()> {
    let name = node.name.as_str();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(CoreError::InvalidPath(node.path.clone()));
    }
    Ok(())
}
