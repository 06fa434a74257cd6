//! Conversion between flat `path -> content` maps and folder/file trees.

use crate::error::VcsError;
use crate::tree::node::{FileNode, ROOT_NAME};
use std::collections::{BTreeMap, BTreeSet};

/// Path separator used by the flat representation.
pub const SEPARATOR: char = '/';

/// Flat representation: forward-slash joined relative path to file content.
pub type FlatFiles = BTreeMap<String, String>;

/// Split and validate a relative path.
///
/// Empty segments (leading, trailing or doubled separators) and `.`/`..` are rejected.
pub fn split_path(path: &str) -> Result<Vec<&str>, VcsError> {
    if path.is_empty() {
        return Err(VcsError::InvalidPath("empty path".to_string()));
    }
    let segments: Vec<&str> = path.split(SEPARATOR).collect();
    for segment in &segments {
        validate_segment(segment).map_err(|reason| {
            VcsError::InvalidPath(format!("{:?}: {}", path, reason))
        })?;
    }
    Ok(segments)
}

fn validate_segment(segment: &str) -> Result<(), &'static str> {
    match segment {
        "" => Err("empty path segment"),
        "." | ".." => Err("relative path segment"),
        s if s.contains('\0') => Err("NUL in path segment"),
        _ => Ok(()),
    }
}

/// Build a tree from flat entries.
///
/// Intermediate folders are created on first use and reused afterwards. A later
/// entry for the same path replaces the earlier content. Using a file as a folder,
/// or a folder as a file, is an `InvalidPath` error.
pub fn tree_from_flat_files<I, P, C>(entries: I) -> Result<FileNode, VcsError>
where
    I: IntoIterator<Item = (P, C)>,
    P: AsRef<str>,
    C: Into<String>,
{
    let mut root = FileNode::folder(ROOT_NAME);
    for (path, content) in entries {
        insert_file(&mut root, path.as_ref(), content.into())?;
    }
    Ok(root)
}

fn insert_file(root: &mut FileNode, path: &str, content: String) -> Result<(), VcsError> {
    let segments = split_path(path)?;
    let (leaf, folders) = match segments.split_last() {
        Some(parts) => parts,
        None => return Err(VcsError::InvalidPath("empty path".to_string())),
    };

    let mut current = root;
    for segment in folders {
        if current.child(segment).is_none() {
            current.upsert_child(FileNode::folder(*segment));
        }
        current = match current.child_mut(segment) {
            Some(next) if next.is_folder() => next,
            _ => {
                return Err(VcsError::InvalidPath(format!(
                    "{:?}: {} is a file, not a folder",
                    path, segment
                )))
            }
        };
    }

    if current.child(leaf).map(FileNode::is_folder).unwrap_or(false) {
        return Err(VcsError::InvalidPath(format!(
            "{:?}: {} is a folder, not a file",
            path, leaf
        )));
    }
    current.upsert_child(FileNode::file(*leaf, content));
    Ok(())
}

/// Flatten a tree into `path -> content`, one entry per file.
pub fn flat_files_from_tree(tree: &FileNode) -> FlatFiles {
    let mut out = FlatFiles::new();
    match tree {
        FileNode::Folder { children, .. } => {
            for child in children {
                collect(child, "", &mut out);
            }
        }
        FileNode::File { name, content } => {
            out.insert(name.clone(), content.clone());
        }
    }
    out
}

fn collect(node: &FileNode, prefix: &str, out: &mut FlatFiles) {
    let path = if prefix.is_empty() {
        node.name().to_string()
    } else {
        format!("{}{}{}", prefix, SEPARATOR, node.name())
    };
    match node {
        FileNode::File { content, .. } => {
            out.insert(path, content.clone());
        }
        FileNode::Folder { children, .. } => {
            for child in children {
                collect(child, &path, out);
            }
        }
    }
}

/// Paths of every folder in the tree (the root excluded), parents before children.
pub fn folder_paths(tree: &FileNode) -> Vec<String> {
    fn walk(node: &FileNode, prefix: &str, out: &mut Vec<String>) {
        for child in node.children().iter().filter(|c| c.is_folder()) {
            let path = if prefix.is_empty() {
                child.name().to_string()
            } else {
                format!("{}{}{}", prefix, SEPARATOR, child.name())
            };
            out.push(path.clone());
            walk(child, &path, out);
        }
    }
    let mut out = Vec::new();
    walk(tree, "", &mut out);
    out
}

/// Check a tree is a `root` folder whose node names are valid path segments,
/// unique among their siblings.
pub fn validate_tree(tree: &FileNode) -> Result<(), VcsError> {
    fn walk(node: &FileNode, prefix: &str) -> Result<(), VcsError> {
        let mut seen = BTreeSet::new();
        for child in node.children() {
            let path = if prefix.is_empty() {
                child.name().to_string()
            } else {
                format!("{}{}{}", prefix, SEPARATOR, child.name())
            };
            if !seen.insert(child.name()) {
                return Err(VcsError::InvalidPath(format!(
                    "{:?}: duplicate sibling name",
                    path
                )));
            }
            if child.name().contains(SEPARATOR) {
                return Err(VcsError::InvalidPath(format!(
                    "{:?}: separator in node name",
                    path
                )));
            }
            validate_segment(child.name())
                .map_err(|reason| VcsError::InvalidPath(format!("{:?}: {}", path, reason)))?;
            walk(child, &path)?;
        }
        Ok(())
    }
    if tree.is_file() {
        return Err(VcsError::InvalidPath(
            "tree root must be a folder".to_string(),
        ));
    }
    if tree.name() != ROOT_NAME {
        return Err(VcsError::InvalidPath(format!(
            "tree root must be named {:?}, found {:?}",
            ROOT_NAME,
            tree.name()
        )));
    }
    walk(tree, "")
}
