//! Repository Backend
//!
//! One contract, two strategies. The engine validates against the branch
//! directory and then hands the loaded project record to the configured backend,
//! which applies its own storage effects and returns the result.
//!
//! - [`SnapshotLogBackend`] keeps everything inside the record: working trees are
//!   record fields and merges overwrite the whole target tree.
//! - [`GitBackend`] keeps each branch's working tree on disk in a git worktree and
//!   delegates commit, merge and reset to git, including conflict markers.

pub mod git;
pub mod snapshot_log;

use crate::branch::{Commit, ProjectRecord};
use crate::error::VcsError;
use crate::tree::FileNode;
use crate::types::BackendKind;
use serde::{Deserialize, Serialize};

pub use git::GitBackend;
pub use snapshot_log::SnapshotLogBackend;

/// Where a merge ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeState {
    Clean,
    Conflicted,
    Complete,
}

/// Result of a merge attempt. `Conflicted` is an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub state: MergeState,
    pub source: String,
    pub target: String,
    /// Paths that need manual resolution; empty unless `Conflicted`.
    pub conflicts: Vec<String>,
    /// Target working tree after the merge (conflict-marked when `Conflicted`).
    pub tree: FileNode,
    /// Merge commit appended to the target, when one was created.
    pub commit: Option<Commit>,
    pub summary: Option<String>,
}

impl MergeOutcome {
    pub fn is_complete(&self) -> bool {
        self.state == MergeState::Complete
    }

    pub fn has_conflicts(&self) -> bool {
        self.state == MergeState::Conflicted
    }
}

/// Storage strategy behind the version-control engine.
///
/// Implementations receive a record already loaded under the project's lock and
/// already validated by the branch directory. They may mutate the record; the
/// engine persists it only when the call returns `Ok`.
pub trait RepositoryBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Prepare native storage for a record that was just created.
    fn initialize(&self, record: &mut ProjectRecord) -> Result<(), VcsError>;

    /// Create native state for branch `name` and return its seed commit, if `base`
    /// has history. The directory inserts the branch afterwards.
    fn create_branch(
        &self,
        record: &ProjectRecord,
        name: &str,
        base: Option<&str>,
    ) -> Result<Option<Commit>, VcsError>;

    /// Remove native state for a branch the directory agreed to delete.
    fn delete_branch(&self, record: &ProjectRecord, name: &str) -> Result<(), VcsError>;

    /// Current working tree of a branch, as an independently owned copy.
    fn materialize(&self, record: &mut ProjectRecord, branch: &str) -> Result<FileNode, VcsError>;

    /// Replace a branch's working tree.
    fn write_working_tree(
        &self,
        record: &mut ProjectRecord,
        branch: &str,
        tree: FileNode,
    ) -> Result<(), VcsError>;

    /// Record the working tree as a new commit appended to the branch.
    fn commit(
        &self,
        record: &mut ProjectRecord,
        branch: &str,
        message: &str,
        author: &str,
    ) -> Result<Commit, VcsError>;

    /// Reset the working tree to a commit of the branch, discarding uncommitted changes.
    fn restore(
        &self,
        record: &mut ProjectRecord,
        branch: &str,
        commit_id: &str,
    ) -> Result<FileNode, VcsError>;

    /// Merge `source` into `target`.
    fn merge(
        &self,
        record: &mut ProjectRecord,
        source: &str,
        target: &str,
        author: &str,
    ) -> Result<MergeOutcome, VcsError>;

    /// Finish a conflicted merge with a resolved tree.
    fn resolve_conflicts(
        &self,
        record: &mut ProjectRecord,
        target: &str,
        resolved: FileNode,
        message: &str,
    ) -> Result<Commit, VcsError>;

    /// Abandon a conflicted merge, returning the target to its last commit.
    fn abort_merge(&self, record: &mut ProjectRecord, target: &str) -> Result<FileNode, VcsError>;

    /// Bring native state back in line with `recorded`, the last saved record.
    ///
    /// Called by the engine when an operation or the save that follows it fails.
    /// Backends without state outside the record have nothing to undo.
    fn rollback(&self, _recorded: &ProjectRecord) -> Result<(), VcsError> {
        Ok(())
    }
}

/// Default message for merge commits.
pub fn merge_message(source: &str, target: &str) -> String {
    format!("Merge branch {} into {}", source, target)
}
