//! Snapshot-Log Backend
//!
//! Branches live entirely inside the project record: a working-tree field plus an
//! embedded list of commits, each holding a full tree snapshot.
//!
//! Merge is a directed whole-tree overwrite. The source tree replaces the target
//! tree wholesale and a merge commit records where it came from. There is no
//! three-way reconciliation, so this backend never reports a conflict; the last
//! writer wins at whole-tree granularity. This is a known limitation of the
//! strategy, not something to patch over here.

use crate::backend::{merge_message, MergeOutcome, MergeState, RepositoryBackend};
use crate::branch::{seed_message, Commit, ProjectRecord};
use crate::error::VcsError;
use crate::tree::{tree_digest, FileNode};
use crate::types::{BackendKind, CommitId, ProjectId};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Author recorded on commits the engine creates on its own.
pub const SYSTEM_AUTHOR: &str = "canopy";

#[derive(Debug, Default, Clone)]
pub struct SnapshotLogBackend;

impl SnapshotLogBackend {
    pub fn new() -> Self {
        Self
    }

    fn make_commit(
        project: &ProjectId,
        branch: &str,
        sequence: usize,
        message: &str,
        author: &str,
        snapshot: FileNode,
    ) -> Commit {
        let timestamp = Utc::now();
        Commit {
            id: commit_id(project, branch, sequence, message, author, &timestamp, &snapshot),
            message: message.to_string(),
            author: author.to_string(),
            timestamp,
            snapshot,
        }
    }
}

/// Deterministic commit id over everything that identifies a commit.
pub fn commit_id(
    project: &ProjectId,
    branch: &str,
    sequence: usize,
    message: &str,
    author: &str,
    timestamp: &DateTime<Utc>,
    snapshot: &FileNode,
) -> CommitId {
    let mut hasher = blake3::Hasher::new();
    for part in [project.as_str(), branch, message, author] {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hasher.update(&(sequence as u64).to_le_bytes());
    hasher.update(
        &timestamp
            .timestamp_nanos_opt()
            .unwrap_or_else(|| timestamp.timestamp_micros())
            .to_le_bytes(),
    );
    hasher.update(&tree_digest(snapshot));
    hex::encode(hasher.finalize().as_bytes())
}

impl RepositoryBackend for SnapshotLogBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::SnapshotLog
    }

    fn initialize(&self, _record: &mut ProjectRecord) -> Result<(), VcsError> {
        Ok(())
    }

    fn create_branch(
        &self,
        record: &ProjectRecord,
        name: &str,
        base: Option<&str>,
    ) -> Result<Option<Commit>, VcsError> {
        let base = match base {
            Some(base) => record.require_branch(base)?,
            None => return Ok(None),
        };
        let latest = match base.latest_commit() {
            Some(latest) => latest,
            None => return Ok(None),
        };
        Ok(Some(Self::make_commit(
            &record.project_id,
            name,
            0,
            &seed_message(name, base),
            SYSTEM_AUTHOR,
            latest.snapshot.clone(),
        )))
    }

    fn delete_branch(&self, _record: &ProjectRecord, _name: &str) -> Result<(), VcsError> {
        Ok(())
    }

    fn materialize(&self, record: &mut ProjectRecord, branch: &str) -> Result<FileNode, VcsError> {
        Ok(record.require_branch(branch)?.working_tree.clone())
    }

    fn write_working_tree(
        &self,
        record: &mut ProjectRecord,
        branch: &str,
        tree: FileNode,
    ) -> Result<(), VcsError> {
        record.require_branch_mut(branch)?.working_tree = tree;
        Ok(())
    }

    fn commit(
        &self,
        record: &mut ProjectRecord,
        branch: &str,
        message: &str,
        author: &str,
    ) -> Result<Commit, VcsError> {
        let project = record.project_id.clone();
        let target = record.require_branch_mut(branch)?;
        let commit = Self::make_commit(
            &project,
            branch,
            target.commits.len(),
            message,
            author,
            target.working_tree.clone(),
        );
        target.append_commit(commit.clone());
        debug!(project = %project, branch, commit = %commit.id, "snapshot committed");
        Ok(commit)
    }

    fn restore(
        &self,
        record: &mut ProjectRecord,
        branch: &str,
        commit_id: &str,
    ) -> Result<FileNode, VcsError> {
        let target = record.require_branch_mut(branch)?;
        let snapshot = target.require_commit(commit_id)?.snapshot.clone();
        target.working_tree = snapshot.clone();
        Ok(snapshot)
    }

    fn merge(
        &self,
        record: &mut ProjectRecord,
        source: &str,
        target: &str,
        author: &str,
    ) -> Result<MergeOutcome, VcsError> {
        let incoming = {
            let source_branch = record.require_branch(source)?;
            match source_branch.latest_commit() {
                Some(latest) if source_branch.working_tree.is_empty() => latest.snapshot.clone(),
                _ => source_branch.working_tree.clone(),
            }
        };

        let project = record.project_id.clone();
        let message = merge_message(source, target);
        let target_branch = record.require_branch_mut(target)?;
        let commit = Self::make_commit(
            &project,
            target,
            target_branch.commits.len(),
            &message,
            author,
            incoming.clone(),
        );
        target_branch.working_tree = incoming.clone();
        target_branch.last_merged_from = Some(source.to_string());
        target_branch.append_commit(commit.clone());

        let summary = format!(
            "Replaced {} with the tree of {} ({} files)",
            target,
            source,
            incoming.file_count()
        );
        Ok(MergeOutcome {
            state: MergeState::Complete,
            source: source.to_string(),
            target: target.to_string(),
            conflicts: Vec::new(),
            tree: incoming,
            commit: Some(commit),
            summary: Some(summary),
        })
    }

    fn resolve_conflicts(
        &self,
        _record: &mut ProjectRecord,
        target: &str,
        _resolved: FileNode,
        _message: &str,
    ) -> Result<Commit, VcsError> {
        Err(VcsError::InvalidOperation(format!(
            "no merge in progress on {}",
            target
        )))
    }

    fn abort_merge(&self, _record: &mut ProjectRecord, target: &str) -> Result<FileNode, VcsError> {
        Err(VcsError::InvalidOperation(format!(
            "no merge in progress on {}",
            target
        )))
    }
}
