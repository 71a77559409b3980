//! Project file trees as the editor hands them over.
//!
//! ```text
//! FileNode tree --flatten--> FlatFileMap --detect/compile--> html
//!      ^
//!      +-- disk::read_tree (CLI hosts only)
//! ```
//!
//! The tree is a read-only snapshot; everything downstream works on the
//! flat `path → content` map, which is a pure function of the tree.

mod disk;
mod flatten;

pub use disk::{read_tree, read_tree_skipping};
pub use flatten::{FlatFileMap, flatten};

use serde::{Deserialize, Serialize};

/// Whether a node carries content or children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
}

/// One node of the editor's project tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}

impl FileNode {
    /// Create a file node.
    pub fn file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
            content: Some(content.into()),
            children: None,
        }
    }

    /// Create a file node without content (flattens to an empty file).
    pub fn empty_file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::File,
            content: None,
            children: None,
        }
    }

    /// Create a directory node.
    pub fn dir(name: impl Into<String>, children: Vec<FileNode>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Directory,
            content: None,
            children: Some(children),
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// What the editor supplies on every debounced edit.
///
/// `active_file` / `active_file_content` carry the unsaved buffer of the
/// file being typed in; it wins over whatever the tree says for that path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorInput {
    pub tree: Vec<FileNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_file_content: Option<String>,
}

impl EditorInput {
    pub fn new(tree: Vec<FileNode>) -> Self {
        Self {
            tree,
            active_file: None,
            active_file_content: None,
        }
    }

    /// Attach the unsaved buffer of the active file.
    pub fn with_active_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.active_file = Some(path.into());
        self.active_file_content = Some(content.into());
        self
    }

    /// Flatten the tree and apply the active-file override.
    pub fn to_flat_map(&self) -> FlatFileMap {
        let mut files = flatten(&self.tree);
        if let (Some(path), Some(content)) = (&self.active_file, &self.active_file_content) {
            files.insert(path, content.clone());
        }
        files
    }
}
