//! Response views
//!
//! Serializable shapes handed to outer services: commit summaries without their
//! snapshot body, branch listings and merge reports.

use crate::backend::{MergeOutcome, MergeState};
use crate::branch::Commit;
use crate::tree::FileNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Commit metadata; the snapshot is fetched on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub id: String,
    pub message: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

impl From<&Commit> for CommitSummary {
    fn from(commit: &Commit) -> Self {
        Self {
            id: commit.id.clone(),
            message: commit.message.clone(),
            author: commit.author.clone(),
            timestamp: commit.timestamp,
        }
    }
}

/// Branch names in creation order plus the active one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchListing {
    pub branches: Vec<String>,
    pub active: String,
}

/// Merge result surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub success: bool,
    pub has_conflicts: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<String>>,
    pub structure: FileNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl From<&MergeOutcome> for MergeReport {
    fn from(outcome: &MergeOutcome) -> Self {
        let has_conflicts = outcome.state == MergeState::Conflicted;
        Self {
            success: outcome.state == MergeState::Complete,
            has_conflicts,
            conflicts: has_conflicts.then(|| outcome.conflicts.clone()),
            structure: outcome.tree.clone(),
            summary: outcome.summary.clone(),
        }
    }
}
