//! Snapshot Store
//!
//! Persists project version-control records. A record embeds every branch's
//! commit list, and each commit owns its full tree snapshot, so the store is the
//! durable home of all snapshots keyed by commit identity.

pub mod memory;
pub mod persistence;

use crate::branch::{Commit, ProjectRecord};
use crate::error::StorageError;
use crate::types::ProjectId;

pub use memory::MemorySnapshotStore;
pub use persistence::SledSnapshotStore;

/// Snapshot Store interface
///
/// Records are loaded and saved whole. Callers mutate a loaded copy and save it
/// only once an operation has fully succeeded, so a failed operation leaves the
/// stored history untouched.
pub trait SnapshotStore: Send + Sync {
    fn load(&self, project: &ProjectId) -> Result<Option<ProjectRecord>, StorageError>;
    fn save(&self, record: &ProjectRecord) -> Result<(), StorageError>;
    fn remove(&self, project: &ProjectId) -> Result<bool, StorageError>;
    fn list_projects(&self) -> Result<Vec<ProjectId>, StorageError>;

    /// Find a commit by id on any branch of a project.
    fn find_commit(
        &self,
        project: &ProjectId,
        commit_id: &str,
    ) -> Result<Option<(String, Commit)>, StorageError> {
        let record = match self.load(project)? {
            Some(record) => record,
            None => return Ok(None),
        };
        Ok(record.branches.into_iter().find_map(|branch| {
            let name = branch.name;
            branch
                .commits
                .into_iter()
                .find(|c| c.id == commit_id)
                .map(|c| (name, c))
        }))
    }
}
