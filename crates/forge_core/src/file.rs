//! Virtual file tree nodes.

use serde::{Deserialize, Serialize};

use crate::merge::normalize_path;

/// Node kind in the virtual file tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Folder,
}

/// A node of the virtual file tree.
///
/// `path` is the merge key: a folder's children always have paths of the form
/// `<folder.path>/<child.name>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub path: String,
    /// Only set on `file` nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Only set on `folder` nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileItem>>,
}

impl FileItem {
    /// Create a file node whose id is its path.
    pub fn file(name: impl Into<String>, path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: path.clone(),
            name: name.into(),
            kind: FileKind::File,
            path,
            content: Some(content.into()),
            children: None,
        }
    }

    /// Create an empty folder node whose id is its path.
    pub fn folder(name: impl Into<String>, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: path.clone(),
            name: name.into(),
            kind: FileKind::Folder,
            path,
            content: None,
            children: Some(Vec::new()),
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == FileKind::Folder
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    /// Children of a folder; empty for files.
    pub fn children(&self) -> &[FileItem] {
        self.children.as_deref().unwrap_or(&[])
    }
}

/// A file node that has not been given an id yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewFile {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileItem>>,
}

impl NewFile {
    pub fn file(name: impl Into<String>, path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FileKind::File,
            path: path.into(),
            content: Some(content.into()),
            children: None,
        }
    }

    pub fn folder(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FileKind::Folder,
            path: path.into(),
            content: None,
            children: Some(Vec::new()),
        }
    }

    /// Give the node an id. The path is stored in its normalized form so the
    /// merger finds the node again.
    pub fn into_item(self, id: impl Into<String>) -> FileItem {
        FileItem {
            id: id.into(),
            name: self.name,
            kind: self.kind,
            path: normalize_path(&self.path),
            content: self.content,
            children: self.children,
        }
    }
}

/// Partial update applied by `update_file`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl FilePatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn apply(&self, item: &mut FileItem) {
        if let Some(ref name) = self.name {
            item.name = name.clone();
        }
        if let Some(ref path) = self.path {
            item.path = normalize_path(path);
        }
        // Content is meaningless on folders
        if let (Some(content), FileKind::File) = (&self.content, item.kind) {
            item.content = Some(content.clone());
        }
    }
}

/// Find a node anywhere in the tree by its path.
///
/// The lookup normalizes the path the same way the merger does, so
/// `src/a.txt` and `/src/a.txt` find the same node.
pub fn find_node<'a>(files: &'a [FileItem], path: &str) -> Option<&'a FileItem> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut level = files;
    let mut current = String::new();
    let mut found = None;

    for segment in segments {
        current.push('/');
        current.push_str(segment);
        let node = level.iter().find(|n| n.path == current)?;
        level = node.children();
        found = Some(node);
    }

    found
}

/// Count file (non-folder) nodes in the tree.
pub fn file_count(files: &[FileItem]) -> usize {
    files
        .iter()
        .map(|n| match n.kind {
            FileKind::File => 1,
            FileKind::Folder => file_count(n.children()),
        })
        .sum()
}
