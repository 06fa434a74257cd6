//! Version Control Engine
//!
//! The façade outer services call. Every operation names a project; the engine
//! takes that project's lock, loads (or lazily creates) its record, validates
//! against the branch directory, delegates to the configured repository backend
//! and saves the record only if the whole operation succeeded.
//!
//! Trees that land on the published branch through a merge, a conflict
//! resolution or a restore are handed to the [`PublishHook`] after the lock is
//! released.

use crate::backend::{GitBackend, MergeOutcome, RepositoryBackend, SnapshotLogBackend};
use crate::backend::git::GitRunner;
use crate::branch::{BranchDirectory, Commit, ProjectRecord};
use crate::concurrency::ProjectLockManager;
use crate::config::CanopyConfig;
use crate::error::VcsError;
use crate::publish::{NoopPublisher, PublishHook};
use crate::store::{SledSnapshotStore, SnapshotStore};
use crate::tree::codec::validate_tree;
use crate::tree::{flat_files_from_tree, tree_from_flat_files, FileNode, FlatFiles};
use crate::types::{BackendKind, ProjectId, DEFAULT_BRANCH};
use crate::views::{BranchListing, CommitSummary};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct VersionControlEngine {
    store: Arc<dyn SnapshotStore>,
    backend: Arc<dyn RepositoryBackend>,
    lock_manager: Arc<ProjectLockManager>,
    publisher: Arc<dyn PublishHook>,
    published_branch: String,
}

impl VersionControlEngine {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        backend: Arc<dyn RepositoryBackend>,
        lock_manager: Arc<ProjectLockManager>,
    ) -> Self {
        Self {
            store,
            backend,
            lock_manager,
            publisher: Arc::new(NoopPublisher),
            published_branch: DEFAULT_BRANCH.to_string(),
        }
    }

    /// Build the sled store and the configured backend for a workspace.
    pub fn from_config(config: &CanopyConfig, workspace_root: &Path) -> Result<Self, VcsError> {
        let paths = config.storage.resolve_paths(workspace_root)?;
        let store = Arc::new(SledSnapshotStore::open(&paths.store)?);
        let backend: Arc<dyn RepositoryBackend> = match config.backend.kind {
            BackendKind::SnapshotLog => Arc::new(SnapshotLogBackend::new()),
            BackendKind::Git => {
                let runner = GitRunner::new(
                    config.git.binary.clone(),
                    config.git.committer_email.clone(),
                );
                Arc::new(GitBackend::with_runner(&paths.repositories, runner)?)
            }
        };
        info!(
            backend = %config.backend.kind,
            store = %paths.store.display(),
            "version control engine ready"
        );
        Ok(Self::new(store, backend, Arc::new(ProjectLockManager::new()))
            .with_published_branch(config.engine.published_branch.clone()))
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn PublishHook>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_published_branch(mut self, branch: impl Into<String>) -> Self {
        self.published_branch = branch.into();
        self
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn published_branch(&self) -> &str {
        &self.published_branch
    }

    // -- branches --

    /// Create `name`, seeded from the latest commit of `base` when it has one.
    pub fn create_branch(
        &self,
        project: &ProjectId,
        name: &str,
        base: Option<&str>,
    ) -> Result<BranchListing, VcsError> {
        self.mutate(project, |record| {
            BranchDirectory::new(record).check_create(name, base)?;
            let seed = self.backend.create_branch(record, name, base)?;
            let seeded = seed.is_some();
            BranchDirectory::new(record).insert_branch(name, seed)?;
            info!(project = %project, branch = name, base = ?base, seeded, "created branch");
            Ok(listing(record))
        })
    }

    pub fn list_branches(&self, project: &ProjectId) -> Result<BranchListing, VcsError> {
        self.read(project, |record| Ok(listing(record)))
    }

    pub fn active_branch(&self, project: &ProjectId) -> Result<String, VcsError> {
        self.read(project, |record| Ok(record.active_branch.clone()))
    }

    /// Move the active pointer. No working tree is touched.
    pub fn switch_branch(&self, project: &ProjectId, name: &str) -> Result<BranchListing, VcsError> {
        self.mutate(project, |record| {
            BranchDirectory::new(record).switch_active_branch(name)?;
            info!(project = %project, branch = name, "switched active branch");
            Ok(listing(record))
        })
    }

    /// Delete a branch and its whole history.
    pub fn delete_branch(&self, project: &ProjectId, name: &str) -> Result<BranchListing, VcsError> {
        self.mutate(project, |record| {
            BranchDirectory::new(record).check_delete(name)?;
            ensure_no_pending_merge(record, name)?;
            self.backend.delete_branch(record, name)?;
            let removed = BranchDirectory::new(record).remove_branch(name)?;
            info!(
                project = %project,
                branch = name,
                commits = removed.commits.len(),
                "deleted branch"
            );
            Ok(listing(record))
        })
    }

    // -- commits --

    /// Record the branch's working tree as a new commit.
    pub fn commit(
        &self,
        project: &ProjectId,
        branch: &str,
        message: &str,
        author: &str,
    ) -> Result<Commit, VcsError> {
        require_author(author)?;
        self.mutate(project, |record| {
            record.require_branch(branch)?;
            ensure_no_pending_merge(record, branch)?;
            let commit = self.backend.commit(record, branch, message, author)?;
            info!(
                project = %project,
                branch,
                commit = %commit.id,
                author,
                files = commit.snapshot.file_count(),
                "committed"
            );
            Ok(commit)
        })
    }

    /// Commit metadata of a branch, oldest first.
    pub fn list_commits(
        &self,
        project: &ProjectId,
        branch: &str,
    ) -> Result<Vec<CommitSummary>, VcsError> {
        self.read(project, |record| {
            Ok(record
                .require_branch(branch)?
                .commits
                .iter()
                .map(CommitSummary::from)
                .collect())
        })
    }

    /// One commit including its snapshot.
    pub fn get_commit(
        &self,
        project: &ProjectId,
        branch: &str,
        commit_id: &str,
    ) -> Result<Commit, VcsError> {
        self.read(project, |record| {
            Ok(record
                .require_branch(branch)?
                .require_commit(commit_id)?
                .clone())
        })
    }

    /// Find which branch holds a commit.
    pub fn locate_commit(
        &self,
        project: &ProjectId,
        commit_id: &str,
    ) -> Result<Option<(String, CommitSummary)>, VcsError> {
        let lock = self.lock_manager.get_lock(project);
        let _guard = lock.read();
        let found = self.store.find_commit(project, commit_id)?;
        Ok(found.map(|(branch, commit)| (branch, CommitSummary::from(&commit))))
    }

    /// Reset a branch's working tree to one of its commits, discarding uncommitted edits.
    pub fn restore_commit(
        &self,
        project: &ProjectId,
        branch: &str,
        commit_id: &str,
    ) -> Result<FileNode, VcsError> {
        let tree = self.mutate(project, |record| {
            record.require_branch(branch)?.require_commit(commit_id)?;
            ensure_no_pending_merge(record, branch)?;
            let tree = self.backend.restore(record, branch, commit_id)?;
            info!(project = %project, branch, commit = commit_id, "restored commit");
            Ok(tree)
        })?;
        self.publish(project, branch, &tree);
        Ok(tree)
    }

    // -- merges --

    /// Merge `source` into `target`. A conflicted merge is an outcome, not an error.
    pub fn merge_branches(
        &self,
        project: &ProjectId,
        source: &str,
        target: &str,
        author: &str,
    ) -> Result<MergeOutcome, VcsError> {
        require_author(author)?;
        if source == target {
            return Err(VcsError::InvalidOperation(format!(
                "cannot merge branch {} into itself",
                source
            )));
        }
        let outcome = self.mutate(project, |record| {
            record.require_branch(source)?;
            record.require_branch(target)?;
            ensure_no_pending_merge(record, target)?;
            let outcome = self.backend.merge(record, source, target, author)?;
            info!(
                project = %project,
                source,
                target,
                state = ?outcome.state,
                conflicts = outcome.conflicts.len(),
                "merged branches"
            );
            Ok(outcome)
        })?;
        if outcome.is_complete() {
            self.publish(project, target, &outcome.tree);
        }
        Ok(outcome)
    }

    /// Finish a conflicted merge on `target` with a resolved tree.
    pub fn resolve_conflicts(
        &self,
        project: &ProjectId,
        target: &str,
        resolved: FileNode,
        message: &str,
    ) -> Result<Commit, VcsError> {
        validate_tree(&resolved)?;
        let commit = self.mutate(project, |record| {
            record.require_branch(target)?;
            let commit = self.backend.resolve_conflicts(record, target, resolved, message)?;
            info!(project = %project, target, commit = %commit.id, "resolved merge conflicts");
            Ok(commit)
        })?;
        self.publish(project, target, &commit.snapshot);
        Ok(commit)
    }

    /// Abandon a conflicted merge on `target`.
    pub fn abort_merge(&self, project: &ProjectId, target: &str) -> Result<FileNode, VcsError> {
        self.mutate(project, |record| {
            record.require_branch(target)?;
            let tree = self.backend.abort_merge(record, target)?;
            info!(project = %project, target, "aborted merge");
            Ok(tree)
        })
    }

    // -- working trees --

    pub fn get_working_tree(&self, project: &ProjectId, branch: &str) -> Result<FileNode, VcsError> {
        self.read(project, |record| {
            record.require_branch(branch)?;
            self.backend.materialize(record, branch)
        })
    }

    pub fn set_working_tree(
        &self,
        project: &ProjectId,
        branch: &str,
        tree: FileNode,
    ) -> Result<(), VcsError> {
        validate_tree(&tree)?;
        self.mutate(project, |record| {
            record.require_branch(branch)?;
            ensure_no_pending_merge(record, branch)?;
            debug!(project = %project, branch, files = tree.file_count(), "writing working tree");
            self.backend.write_working_tree(record, branch, tree)
        })
    }

    pub fn get_flat_files(&self, project: &ProjectId, branch: &str) -> Result<FlatFiles, VcsError> {
        self.get_working_tree(project, branch)
            .map(|tree| flat_files_from_tree(&tree))
    }

    pub fn set_flat_files(
        &self,
        project: &ProjectId,
        branch: &str,
        files: &FlatFiles,
    ) -> Result<(), VcsError> {
        let tree = tree_from_flat_files(files.iter().map(|(p, c)| (p.as_str(), c.as_str())))?;
        self.set_working_tree(project, branch, tree)
    }

    /// Projects that have a stored record.
    pub fn list_projects(&self) -> Result<Vec<ProjectId>, VcsError> {
        Ok(self.store.list_projects()?)
    }

    // -- internals --

    /// Run `op` on a loaded copy of the record under the write lock; save on success.
    ///
    /// When `op` or the save fails the backend is rolled back to the record as
    /// last saved, so native history never runs ahead of it.
    fn mutate<T>(
        &self,
        project: &ProjectId,
        op: impl FnOnce(&mut ProjectRecord) -> Result<T, VcsError>,
    ) -> Result<T, VcsError> {
        let lock = self.lock_manager.get_lock(project);
        let _guard = lock.write();
        let mut record = self.load_or_create(project)?;
        let recorded = record.clone();
        let result = op(&mut record).and_then(|value| {
            record.touch();
            self.store.save(&record)?;
            Ok(value)
        });
        if let Err(err) = &result {
            debug!(project = %project, error = %err, "operation failed, rolling back backend");
            if let Err(rollback) = self.backend.rollback(&recorded) {
                warn!(project = %project, error = %rollback, "backend rollback failed");
            }
        }
        result
    }

    /// Run `op` under the read lock. A missing record is created under the write lock.
    fn read<T>(
        &self,
        project: &ProjectId,
        op: impl FnOnce(&mut ProjectRecord) -> Result<T, VcsError>,
    ) -> Result<T, VcsError> {
        let lock = self.lock_manager.get_lock(project);
        {
            let _guard = lock.read();
            if let Some(mut record) = self.store.load(project)? {
                self.check_backend(&record)?;
                return op(&mut record);
            }
        }
        let _guard = lock.write();
        let mut record = self.load_or_create(project)?;
        op(&mut record)
    }

    /// Caller holds the project's write lock.
    fn load_or_create(&self, project: &ProjectId) -> Result<ProjectRecord, VcsError> {
        if project.as_str().trim().is_empty() {
            return Err(VcsError::InvalidOperation("project id is empty".to_string()));
        }
        if let Some(record) = self.store.load(project)? {
            self.check_backend(&record)?;
            return Ok(record);
        }
        let mut record = ProjectRecord::new(project.clone(), self.backend.kind());
        self.backend.initialize(&mut record)?;
        self.store.save(&record)?;
        info!(project = %project, backend = %self.backend.kind(), "created project record");
        Ok(record)
    }

    fn check_backend(&self, record: &ProjectRecord) -> Result<(), VcsError> {
        if record.backend != self.backend.kind() {
            return Err(VcsError::BackendFailure(format!(
                "project {} is stored by the {} backend, engine runs {}",
                record.project_id,
                record.backend,
                self.backend.kind()
            )));
        }
        Ok(())
    }

    fn publish(&self, project: &ProjectId, branch: &str, tree: &FileNode) {
        if branch != self.published_branch {
            return;
        }
        match self.publisher.publish(project, branch, tree) {
            Ok(()) => debug!(project = %project, branch, "published tree"),
            Err(err) => warn!(project = %project, branch, error = %err, "publish hook failed"),
        }
    }
}

fn listing(record: &ProjectRecord) -> BranchListing {
    BranchListing {
        branches: crate::branch::list_branches(record),
        active: record.active_branch.clone(),
    }
}

fn require_author(author: &str) -> Result<(), VcsError> {
    if author.trim().is_empty() {
        return Err(VcsError::InvalidOperation("author is required".to_string()));
    }
    Ok(())
}

fn ensure_no_pending_merge(record: &ProjectRecord, branch: &str) -> Result<(), VcsError> {
    if record.require_branch(branch)?.has_pending_merge() {
        return Err(VcsError::ConflictPending(branch.to_string()));
    }
    Ok(())
}
