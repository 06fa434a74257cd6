use canopy::concurrency::ProjectLockManager;
use canopy::tree::tree_from_flat_files;
use canopy::{
    FileNode, GitBackend, MemorySnapshotStore, ProjectId, ProjectRecord, PublishHook,
    SnapshotLogBackend, SnapshotStore, StorageError, VersionControlEngine,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub fn tree(files: &[(&str, &str)]) -> FileNode {
    tree_from_flat_files(files.iter().copied()).unwrap()
}

pub fn project(id: &str) -> ProjectId {
    ProjectId::new(id)
}

pub fn snapshot_log_engine() -> VersionControlEngine {
    VersionControlEngine::new(
        Arc::new(MemorySnapshotStore::new()),
        Arc::new(SnapshotLogBackend::new()),
        Arc::new(ProjectLockManager::new()),
    )
}

pub fn git_available() -> bool {
    std::process::Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

pub fn git_engine(root: &Path) -> VersionControlEngine {
    git_engine_with_store(root, Arc::new(MemorySnapshotStore::new()))
}

pub fn git_engine_with_store(root: &Path, store: Arc<dyn SnapshotStore>) -> VersionControlEngine {
    VersionControlEngine::new(
        store,
        Arc::new(GitBackend::open(&root.join("repositories")).unwrap()),
        Arc::new(ProjectLockManager::new()),
    )
}

/// In-memory store whose saves can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemorySnapshotStore,
    fail_saves: AtomicBool,
}

impl FlakyStore {
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

impl SnapshotStore for FlakyStore {
    fn load(&self, project: &ProjectId) -> Result<Option<ProjectRecord>, StorageError> {
        self.inner.load(project)
    }

    fn save(&self, record: &ProjectRecord) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.save(record)
    }

    fn remove(&self, project: &ProjectId) -> Result<bool, StorageError> {
        self.inner.remove(project)
    }

    fn list_projects(&self) -> Result<Vec<ProjectId>, StorageError> {
        self.inner.list_projects()
    }
}

/// Records every published tree.
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<(String, String, FileNode)>>,
}

impl PublishHook for RecordingPublisher {
    fn publish(&self, project: &ProjectId, branch: &str, tree: &FileNode) -> Result<(), String> {
        self.published
            .lock()
            .push((project.to_string(), branch.to_string(), tree.clone()));
        Ok(())
    }
}
