//! File tree node types

use serde::{Deserialize, Serialize};

/// Name of the folder at the top of every project tree.
pub const ROOT_NAME: &str = "root";

/// One element of a project tree.
///
/// Serializes to the shape `{ "name", "type": "file"|"folder", "content"?, "children"? }`.
/// A file never carries children and a folder never carries content; the enum makes
/// both unrepresentable rather than ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileNode {
    File {
        name: String,
        #[serde(default)]
        content: String,
    },
    Folder {
        name: String,
        #[serde(default)]
        children: Vec<FileNode>,
    },
}

impl FileNode {
    /// Empty root folder.
    pub fn root() -> Self {
        Self::folder(ROOT_NAME)
    }

    pub fn file(name: impl Into<String>, content: impl Into<String>) -> Self {
        FileNode::File {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn folder(name: impl Into<String>) -> Self {
        FileNode::Folder {
            name: name.into(),
            children: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FileNode::File { name, .. } | FileNode::Folder { name, .. } => name,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, FileNode::File { .. })
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, FileNode::Folder { .. })
    }

    /// File content, `None` for folders.
    pub fn content(&self) -> Option<&str> {
        match self {
            FileNode::File { content, .. } => Some(content),
            FileNode::Folder { .. } => None,
        }
    }

    /// Children of a folder; files have none.
    pub fn children(&self) -> &[FileNode] {
        match self {
            FileNode::Folder { children, .. } => children,
            FileNode::File { .. } => &[],
        }
    }

    pub fn child(&self, name: &str) -> Option<&FileNode> {
        self.children().iter().find(|c| c.name() == name)
    }

    pub(crate) fn child_mut(&mut self, name: &str) -> Option<&mut FileNode> {
        match self {
            FileNode::Folder { children, .. } => children.iter_mut().find(|c| c.name() == name),
            FileNode::File { .. } => None,
        }
    }

    /// Insert a child, replacing any sibling with the same name in place.
    ///
    /// Returns false when `self` is a file.
    pub fn upsert_child(&mut self, node: FileNode) -> bool {
        match self {
            FileNode::Folder { children, .. } => {
                if let Some(existing) = children.iter_mut().find(|c| c.name() == node.name()) {
                    *existing = node;
                } else {
                    children.push(node);
                }
                true
            }
            FileNode::File { .. } => false,
        }
    }

    /// True for a folder without children.
    pub fn is_empty(&self) -> bool {
        match self {
            FileNode::Folder { children, .. } => children.is_empty(),
            FileNode::File { .. } => false,
        }
    }

    /// Look up a node by `/`-separated path relative to this node.
    pub fn get(&self, path: &str) -> Option<&FileNode> {
        let mut current = self;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// Number of file leaves below this node.
    pub fn file_count(&self) -> usize {
        match self {
            FileNode::File { .. } => 1,
            FileNode::Folder { children, .. } => children.iter().map(FileNode::file_count).sum(),
        }
    }

    /// Copy without folders that hold no files at any depth. `self` is always kept.
    pub fn without_empty_folders(&self) -> FileNode {
        match self {
            FileNode::File { .. } => self.clone(),
            FileNode::Folder { name, children } => FileNode::Folder {
                name: name.clone(),
                children: children
                    .iter()
                    .filter(|c| c.file_count() > 0)
                    .map(FileNode::without_empty_folders)
                    .collect(),
            },
        }
    }

    /// Recursively sort children by name.
    ///
    /// Child order is insertion order everywhere else; callers that compare trees
    /// built along different paths normalize with this first.
    pub fn sort(&mut self) {
        if let FileNode::Folder { children, .. } = self {
            children.sort_by(|a, b| a.name().cmp(b.name()));
            for child in children.iter_mut() {
                child.sort();
            }
        }
    }

    /// Sorted copy.
    pub fn sorted(&self) -> FileNode {
        let mut copy = self.clone();
        copy.sort();
        copy
    }
}

impl Default for FileNode {
    fn default() -> Self {
        FileNode::root()
    }
}
