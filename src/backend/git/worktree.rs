//! Reading and writing project trees on disk
//!
//! Writes are incremental: a file is only rewritten when its bytes differ from
//! what is already on disk, so git sees untouched files as unmodified and large
//! trees with small edits stay cheap.

use crate::error::{StorageError, VcsError};
use crate::tree::codec::{flat_files_from_tree, folder_paths, SEPARATOR};
use crate::tree::{file_digest, FileNode, ROOT_NAME};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use walkdir::WalkDir;

/// Directory entry git keeps inside every worktree.
pub const GIT_DIR_NAME: &str = ".git";

/// Counts from one incremental write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub written: usize,
    pub unchanged: usize,
    pub removed: usize,
}

fn io_failure(path: &Path, err: std::io::Error) -> VcsError {
    VcsError::BackendFailure(format!("{}: {}", path.display(), StorageError::IoError(err)))
}

fn relative_segments(root: &Path, path: &Path) -> Result<Vec<String>, VcsError> {
    let rel = path.strip_prefix(root).map_err(|_| {
        VcsError::BackendFailure(format!(
            "{} is outside {}",
            path.display(),
            root.display()
        ))
    })?;
    rel.components()
        .map(|c| {
            c.as_os_str()
                .to_str()
                .map(|s| s.nfc().collect::<String>())
                .ok_or_else(|| {
                    VcsError::InvalidPath(format!("non UTF-8 file name: {:?}", c.as_os_str()))
                })
        })
        .collect()
}

fn walker(dir: &Path) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> {
    WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != GIT_DIR_NAME)
}

fn walk_failure(err: walkdir::Error) -> VcsError {
    VcsError::BackendFailure(format!("Failed to walk worktree: {}", err))
}

/// Read a worktree into a tree rooted at `root`. Symlinks are skipped.
pub fn read_tree(dir: &Path) -> Result<FileNode, VcsError> {
    if !dir.is_dir() {
        return Err(VcsError::BackendFailure(format!(
            "worktree {} does not exist",
            dir.display()
        )));
    }
    let mut root = FileNode::folder(ROOT_NAME);
    for entry in walker(dir) {
        let entry = entry.map_err(walk_failure)?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            debug!(path = %entry.path().display(), "skipping symlink");
            continue;
        }
        let segments = relative_segments(dir, entry.path())?;
        let (name, parents) = match segments.split_last() {
            Some(parts) => parts,
            None => continue,
        };
        let parent = folder_at(&mut root, parents).ok_or_else(|| {
            VcsError::BackendFailure(format!(
                "parent of {} missing while reading worktree",
                entry.path().display()
            ))
        })?;
        if file_type.is_dir() {
            parent.upsert_child(FileNode::folder(name.clone()));
        } else if file_type.is_file() {
            let bytes = std::fs::read(entry.path()).map_err(|e| io_failure(entry.path(), e))?;
            let content = String::from_utf8(bytes).map_err(|_| {
                VcsError::BackendFailure(format!(
                    "{} is not UTF-8 text",
                    entry.path().display()
                ))
            })?;
            parent.upsert_child(FileNode::file(name.clone(), content));
        }
    }
    Ok(root)
}

fn folder_at<'a>(root: &'a mut FileNode, segments: &[String]) -> Option<&'a mut FileNode> {
    let mut current = root;
    for segment in segments {
        current = current.child_mut(segment)?;
        if !current.is_folder() {
            return None;
        }
    }
    Some(current)
}

fn disk_path(dir: &Path, rel: &str) -> PathBuf {
    let mut path = dir.to_path_buf();
    for segment in rel.split(SEPARATOR) {
        path.push(segment);
    }
    path
}

fn existing_files(dir: &Path) -> Result<BTreeMap<String, PathBuf>, VcsError> {
    let mut files = BTreeMap::new();
    for entry in walker(dir) {
        let entry = entry.map_err(walk_failure)?;
        if entry.file_type().is_dir() {
            continue;
        }
        let rel = relative_segments(dir, entry.path())?.join("/");
        files.insert(rel, entry.path().to_path_buf());
    }
    Ok(files)
}

/// Make the worktree at `dir` hold exactly `tree`, touching only what differs.
pub fn write_tree(dir: &Path, tree: &FileNode) -> Result<WriteStats, VcsError> {
    let desired = flat_files_from_tree(tree);
    let desired_folders: BTreeSet<String> = folder_paths(tree).into_iter().collect();
    let mut stats = WriteStats::default();

    // Files (and symlinks) that are not part of the new tree
    for (rel, path) in existing_files(dir)? {
        if !desired.contains_key(&rel) {
            std::fs::remove_file(&path).map_err(|e| io_failure(&path, e))?;
            stats.removed += 1;
        }
    }

    for folder in &desired_folders {
        let path = disk_path(dir, folder);
        std::fs::create_dir_all(&path).map_err(|e| io_failure(&path, e))?;
    }

    for (rel, content) in &desired {
        let path = disk_path(dir, rel);
        if path.is_dir() {
            std::fs::remove_dir_all(&path).map_err(|e| io_failure(&path, e))?;
        } else if path.is_file() {
            let current = std::fs::read(&path).map_err(|e| io_failure(&path, e))?;
            if file_digest(&current) == file_digest(content.as_bytes()) {
                stats.unchanged += 1;
                continue;
            }
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_failure(parent, e))?;
        }
        std::fs::write(&path, content).map_err(|e| io_failure(&path, e))?;
        stats.written += 1;
    }

    prune_empty_dirs(dir, &desired_folders)?;
    Ok(stats)
}

/// Remove directories that are empty and not folders of the desired tree.
fn prune_empty_dirs(dir: &Path, keep: &BTreeSet<String>) -> Result<(), VcsError> {
    let walk = WalkDir::new(dir)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_entry(|e| e.file_name() != GIT_DIR_NAME);
    for entry in walk {
        let entry = entry.map_err(walk_failure)?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let rel = relative_segments(dir, entry.path())?.join("/");
        if keep.contains(&rel) {
            continue;
        }
        let is_empty = std::fs::read_dir(entry.path())
            .map_err(|e| io_failure(entry.path(), e))?
            .next()
            .is_none();
        if is_empty {
            std::fs::remove_dir(entry.path()).map_err(|e| io_failure(entry.path(), e))?;
        }
    }
    Ok(())
}

/// Reject trees that would write into git's own directory.
pub fn check_reserved_names(tree: &FileNode) -> Result<(), VcsError> {
    for child in tree.children() {
        if child.name() == GIT_DIR_NAME {
            return Err(VcsError::InvalidPath(format!(
                "{} is reserved by the repository",
                GIT_DIR_NAME
            )));
        }
        check_reserved_names(child)?;
    }
    Ok(())
}
