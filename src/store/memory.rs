//! In-memory snapshot store.

use crate::branch::ProjectRecord;
use crate::error::StorageError;
use crate::store::SnapshotStore;
use crate::types::ProjectId;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Keeps records in a map. Loads return clones, so stored history is never aliased.
#[derive(Default)]
pub struct MemorySnapshotStore {
    records: RwLock<HashMap<ProjectId, ProjectRecord>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, project: &ProjectId) -> Result<Option<ProjectRecord>, StorageError> {
        Ok(self.records.read().get(project).cloned())
    }

    fn save(&self, record: &ProjectRecord) -> Result<(), StorageError> {
        self.records
            .write()
            .insert(record.project_id.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, project: &ProjectId) -> Result<bool, StorageError> {
        Ok(self.records.write().remove(project).is_some())
    }

    fn list_projects(&self) -> Result<Vec<ProjectId>, StorageError> {
        let mut ids: Vec<ProjectId> = self.records.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
