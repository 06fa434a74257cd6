//! Commits, branches and the per-project record that owns them.

use crate::error::VcsError;
use crate::tree::FileNode;
use crate::types::{BackendKind, CommitId, ProjectId, DEFAULT_BRANCH};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A commit exclusively owns its snapshot; nothing hands out a mutable path into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub message: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub snapshot: FileNode,
}

/// Merge left unresolved on a target branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMerge {
    pub source: String,
    pub author: String,
    pub conflicts: Vec<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    /// Chronological and append-only.
    pub commits: Vec<Commit>,
    pub working_tree: FileNode,
    #[serde(default)]
    pub last_merged_from: Option<String>,
    #[serde(default)]
    pub pending_merge: Option<PendingMerge>,
    pub created_at: DateTime<Utc>,
}

impl Branch {
    /// New branch, optionally seeded with one commit whose snapshot becomes the working tree.
    pub fn new(name: impl Into<String>, seed: Option<Commit>) -> Self {
        let working_tree = seed
            .as_ref()
            .map(|c| c.snapshot.clone())
            .unwrap_or_else(FileNode::root);
        Self {
            name: name.into(),
            commits: seed.into_iter().collect(),
            working_tree,
            last_merged_from: None,
            pending_merge: None,
            created_at: Utc::now(),
        }
    }

    pub fn latest_commit(&self) -> Option<&Commit> {
        self.commits.last()
    }

    pub fn head_id(&self) -> Option<&str> {
        self.latest_commit().map(|c| c.id.as_str())
    }

    pub fn find_commit(&self, id: &str) -> Option<&Commit> {
        self.commits.iter().find(|c| c.id == id)
    }

    pub fn require_commit(&self, id: &str) -> Result<&Commit, VcsError> {
        self.find_commit(id).ok_or_else(|| VcsError::CommitNotFound {
            branch: self.name.clone(),
            commit: id.to_string(),
        })
    }

    pub fn append_commit(&mut self, commit: Commit) {
        self.commits.push(commit);
    }

    pub fn has_pending_merge(&self) -> bool {
        self.pending_merge.is_some()
    }
}

/// Version-control state of one project; the unit of storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub project_id: ProjectId,
    pub backend: BackendKind,
    /// Creation order.
    pub branches: Vec<Branch>,
    pub active_branch: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectRecord {
    /// Fresh record with an empty `main` branch.
    pub fn new(project_id: ProjectId, backend: BackendKind) -> Self {
        let now = Utc::now();
        Self {
            project_id,
            backend,
            branches: vec![Branch::new(DEFAULT_BRANCH, None)],
            active_branch: DEFAULT_BRANCH.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn branch(&self, name: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.name == name)
    }

    pub fn branch_mut(&mut self, name: &str) -> Option<&mut Branch> {
        self.branches.iter_mut().find(|b| b.name == name)
    }

    pub fn require_branch(&self, name: &str) -> Result<&Branch, VcsError> {
        self.branch(name)
            .ok_or_else(|| VcsError::BranchNotFound(name.to_string()))
    }

    pub fn require_branch_mut(&mut self, name: &str) -> Result<&mut Branch, VcsError> {
        self.branch_mut(name)
            .ok_or_else(|| VcsError::BranchNotFound(name.to_string()))
    }

    pub fn has_branch(&self, name: &str) -> bool {
        self.branch(name).is_some()
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
