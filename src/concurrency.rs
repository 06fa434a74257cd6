//! Per-project locking
//!
//! Every engine operation on a project runs inside that project's critical
//! section. Readers share the lock; writers hold it exclusively. Projects never
//! contend with one another.

use crate::types::ProjectId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Keyed table of per-project read-write locks
pub struct ProjectLockManager {
    /// Map from ProjectId to that project's lock. Entries are created on first use
    /// and kept for the life of the manager.
    locks: RwLock<HashMap<ProjectId, Arc<RwLock<()>>>>,
}

impl ProjectLockManager {
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the lock for a project.
    ///
    /// Callers take `.read()` or `.write()` on the returned lock.
    pub fn get_lock(&self, project: &ProjectId) -> Arc<RwLock<()>> {
        {
            let map = self.locks.read();
            if let Some(lock) = map.get(project) {
                return lock.clone();
            }
        }

        let mut map = self.locks.write();
        // Another thread may have inserted it between the two map locks.
        map.entry(project.clone())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Number of projects that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProjectLockManager {
    fn default() -> Self {
        Self::new()
    }
}
