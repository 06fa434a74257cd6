//! Sled-backed snapshot store
//!
//! One sled tree, `projects`, maps a project id to the JSON document of its
//! whole record. Every save is flushed before returning.

use crate::branch::ProjectRecord;
use crate::error::StorageError;
use crate::store::SnapshotStore;
use crate::types::ProjectId;
use std::path::Path;

const PROJECTS_TREE: &str = "projects";

pub struct SledSnapshotStore {
    db: sled::Db,
    projects: sled::Tree,
}

impl SledSnapshotStore {
    /// Open (or create) a store at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(path)?;
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Wrap an already opened database.
    pub fn from_db(db: sled::Db) -> Result<Self, StorageError> {
        let projects = db.open_tree(PROJECTS_TREE)?;
        Ok(Self { db, projects })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

impl SnapshotStore for SledSnapshotStore {
    fn load(&self, project: &ProjectId) -> Result<Option<ProjectRecord>, StorageError> {
        match self.projects.get(project.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn save(&self, record: &ProjectRecord) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(record)?;
        self.projects
            .insert(record.project_id.as_str().as_bytes(), bytes)?;
        self.projects.flush()?;
        Ok(())
    }

    fn remove(&self, project: &ProjectId) -> Result<bool, StorageError> {
        let removed = self.projects.remove(project.as_str().as_bytes())?;
        self.projects.flush()?;
        Ok(removed.is_some())
    }

    fn list_projects(&self) -> Result<Vec<ProjectId>, StorageError> {
        let mut ids = Vec::new();
        for key in self.projects.iter().keys() {
            let key = key?;
            let id = String::from_utf8(key.to_vec()).map_err(|e| {
                StorageError::InvalidPath(format!("non UTF-8 project key: {}", e))
            })?;
            ids.push(ProjectId::new(id));
        }
        Ok(ids)
    }
}
