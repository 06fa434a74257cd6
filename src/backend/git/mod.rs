//! Filesystem-VCS Backend
//!
//! Each project is a real git repository on disk. Every branch gets its own
//! worktree so uncommitted edits on one branch never leak into another:
//!
//! ```text
//! <repositories>/<project>/main/             main branch (the repository itself)
//! <repositories>/<project>/branches/<slug>/  linked worktree per other branch
//! ```
//!
//! The on-disk worktree is the authoritative working tree; the record's
//! `working_tree` field is refreshed from disk after every operation. Commit,
//! merge and reset semantics are git's own, including conflict markers.

pub mod command;
pub mod worktree;

use crate::backend::{merge_message, MergeOutcome, MergeState, RepositoryBackend};
use crate::branch::{seed_message, Branch, Commit, PendingMerge, ProjectRecord};
use crate::error::VcsError;
use crate::tree::codec::validate_tree;
use crate::tree::FileNode;
use crate::types::{BackendKind, ProjectId, DEFAULT_BRANCH};
use chrono::{DateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub use command::GitRunner;
pub use worktree::{read_tree, write_tree, WriteStats};

/// Ref pinned to the empty root commit every repository starts with.
pub const ROOT_REF: &str = "refs/canopy/root";

const MAIN_DIR: &str = "main";
const BRANCHES_DIR: &str = "branches";

/// Default committer email for native commits.
pub const DEFAULT_EMAIL: &str = "vcs@canopy.local";

pub struct GitBackend {
    root: PathBuf,
    git: GitRunner,
}

impl GitBackend {
    /// Backend storing repositories under `root`, using `git` from `PATH`.
    pub fn open(root: &Path) -> Result<Self, VcsError> {
        Self::with_runner(root, GitRunner::new("git", DEFAULT_EMAIL))
    }

    /// Backend with an explicit git runner.
    pub fn with_runner(root: &Path, git: GitRunner) -> Result<Self, VcsError> {
        std::fs::create_dir_all(root).map_err(|e| {
            VcsError::BackendFailure(format!(
                "Failed to create repositories directory {}: {}",
                root.display(),
                e
            ))
        })?;
        let root = dunce::canonicalize(root).map_err(|e| {
            VcsError::BackendFailure(format!(
                "Failed to canonicalize repositories directory {}: {}",
                root.display(),
                e
            ))
        })?;
        let version = git.version()?;
        debug!(root = %root.display(), %version, "git backend ready");
        Ok(Self { root, git })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn project_dir(&self, project: &ProjectId) -> Result<PathBuf, VcsError> {
        let id = project.as_str();
        let safe = !id.is_empty()
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !safe {
            return Err(VcsError::InvalidPath(format!(
                "project id {:?} cannot be used as a repository directory",
                id
            )));
        }
        Ok(self.root.join(id))
    }

    /// Directory holding the main repository.
    pub fn repository_dir(&self, project: &ProjectId) -> Result<PathBuf, VcsError> {
        Ok(self.project_dir(project)?.join(MAIN_DIR))
    }

    /// Worktree directory of a branch.
    pub fn worktree_dir(&self, project: &ProjectId, branch: &str) -> Result<PathBuf, VcsError> {
        if branch == DEFAULT_BRANCH {
            return self.repository_dir(project);
        }
        let digest = blake3::hash(branch.as_bytes()).to_hex();
        Ok(self
            .project_dir(project)?
            .join(BRANCHES_DIR)
            .join(&digest[..16]))
    }

    fn branch_dir(&self, record: &ProjectRecord, branch: &str) -> Result<PathBuf, VcsError> {
        record.require_branch(branch)?;
        self.worktree_dir(&record.project_id, branch)
    }

    /// Build a commit record from HEAD of a worktree, reading the snapshot back from disk.
    ///
    /// Git stores no empty folders, so they are left out of the snapshot even when
    /// they are still on disk.
    fn head_commit(&self, dir: &Path, message: &str, author: &str) -> Result<Commit, VcsError> {
        let id = self.git.rev_parse(dir, "HEAD")?;
        let seconds = self.git.commit_time(dir, &id)?;
        let timestamp: DateTime<Utc> = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .unwrap_or_else(Utc::now);
        let snapshot = read_tree(dir)?.without_empty_folders();
        Ok(Commit {
            id,
            message: message.to_string(),
            author: author.to_string(),
            timestamp,
            snapshot,
        })
    }

    /// Stage everything and commit; on any failure after the native commit, move
    /// the branch back so nothing unrecorded stays in history.
    fn stage_and_commit(
        &self,
        dir: &Path,
        message: &str,
        author: &str,
    ) -> Result<Commit, VcsError> {
        let previous = self.git.rev_parse(dir, "HEAD")?;
        self.git.run(dir, &["add", "--all", "--force", "."])?;
        self.git.run_as(
            dir,
            &["commit", "-q", "--allow-empty", "--allow-empty-message", "-m", message],
            author,
        )?;

        match self.head_commit(dir, message, author) {
            Ok(commit) => Ok(commit),
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "rolling back native commit");
                if let Err(reset) = self.git.run(dir, &["reset", "-q", "--soft", &previous]) {
                    warn!(dir = %dir.display(), error = %reset, "rollback failed");
                }
                Err(err)
            }
        }
    }

    fn remove_branch(&self, project: &ProjectId, name: &str) -> Result<(), VcsError> {
        let repo = self.repository_dir(project)?;
        let dir = self.worktree_dir(project, name)?;
        if dir.exists() {
            let dir_arg = dir.to_string_lossy().to_string();
            self.git
                .run(&repo, &["worktree", "remove", "--force", &dir_arg])?;
        }
        self.git.run(&repo, &["worktree", "prune"])?;
        self.git.run(&repo, &["branch", "-D", name])?;
        Ok(())
    }

    /// Put one branch back on its recorded head and merge state.
    ///
    /// Unrecorded merge commits are dropped with their files, since a merge only
    /// starts on a clean target. Other unrecorded commits keep their files as
    /// uncommitted changes.
    fn reconcile_branch(
        &self,
        project: &ProjectId,
        branch: &Branch,
        native: &[String],
        root: &str,
    ) -> Result<(), VcsError> {
        let repo = self.repository_dir(project)?;
        let dir = self.worktree_dir(project, &branch.name)?;
        let expected = branch.head_id().unwrap_or(root);
        let has_ref = native.iter().any(|n| n == &branch.name);

        if branch.name != DEFAULT_BRANCH && (!has_ref || !dir.exists()) {
            warn!(project = %project, branch = %branch.name, "recreating branch worktree");
            self.git.run(&repo, &["worktree", "prune"])?;
            let dir_arg = dir.to_string_lossy().to_string();
            if has_ref {
                self.git
                    .run(&repo, &["worktree", "add", &dir_arg, &branch.name])?;
            } else {
                self.git.run(
                    &repo,
                    &["worktree", "add", "-b", &branch.name, &dir_arg, expected],
                )?;
            }
        }

        let head = self.git.rev_parse(&dir, "HEAD")?;
        if head != expected {
            let unrecorded_merge =
                branch.pending_merge.is_none() && self.git.parent_count(&dir, "HEAD")? > 1;
            let mode = if unrecorded_merge { "--hard" } else { "--soft" };
            warn!(
                project = %project,
                branch = %branch.name,
                %head,
                expected,
                mode,
                "resetting branch to recorded head"
            );
            self.git.run(&dir, &["reset", "-q", mode, expected])?;
        }

        let stopped = self.git.merge_in_progress(&dir)?;
        match (&branch.pending_merge, stopped) {
            (None, true) => {
                warn!(project = %project, branch = %branch.name, "aborting unrecorded merge");
                self.git.run(&dir, &["merge", "--abort"])?;
            }
            (Some(pending), false) => {
                let source = self
                    .git
                    .rev_parse(&dir, &format!("refs/heads/{}", pending.source))?;
                let path = self.git.git_path(&dir, "MERGE_HEAD")?;
                std::fs::write(&path, format!("{}\n", source)).map_err(|e| {
                    VcsError::BackendFailure(format!(
                        "Failed to restore {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                warn!(project = %project, branch = %branch.name, "restored pending merge");
            }
            _ => {}
        }
        Ok(())
    }

    fn refresh(&self, record: &mut ProjectRecord, branch: &str, dir: &Path) -> Result<FileNode, VcsError> {
        let tree = read_tree(dir)?;
        record.require_branch_mut(branch)?.working_tree = tree.clone();
        Ok(tree)
    }
}

impl RepositoryBackend for GitBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Git
    }

    fn initialize(&self, record: &mut ProjectRecord) -> Result<(), VcsError> {
        let dir = self.repository_dir(&record.project_id)?;
        if dir.join(worktree::GIT_DIR_NAME).exists() {
            debug!(project = %record.project_id, "reusing existing repository");
            self.refresh(record, DEFAULT_BRANCH, &dir)?;
            return Ok(());
        }
        std::fs::create_dir_all(&dir).map_err(|e| {
            VcsError::BackendFailure(format!("Failed to create {}: {}", dir.display(), e))
        })?;
        self.git.run(&dir, &["init", "-q"])?;
        let head = format!("refs/heads/{}", DEFAULT_BRANCH);
        self.git.run(&dir, &["symbolic-ref", "HEAD", &head])?;
        self.git.run(
            &dir,
            &["commit", "-q", "--allow-empty", "-m", "Initialize repository"],
        )?;
        self.git.run(&dir, &["update-ref", ROOT_REF, "HEAD"])?;
        info!(project = %record.project_id, dir = %dir.display(), "initialized repository");
        Ok(())
    }

    fn create_branch(
        &self,
        record: &ProjectRecord,
        name: &str,
        base: Option<&str>,
    ) -> Result<Option<Commit>, VcsError> {
        let repo = self.repository_dir(&record.project_id)?;
        let dir = self.worktree_dir(&record.project_id, name)?;
        let base = match base {
            Some(base) => Some(record.require_branch(base)?),
            None => None,
        };
        let seeded_from = base.filter(|b| !b.commits.is_empty());
        let start = match seeded_from {
            Some(b) => format!("refs/heads/{}", b.name),
            None => ROOT_REF.to_string(),
        };

        if dir.exists() {
            // Leftover from a branch deleted outside the engine
            self.git.run(&repo, &["worktree", "prune"])?;
            std::fs::remove_dir_all(&dir).map_err(|e| {
                VcsError::BackendFailure(format!("Failed to clear {}: {}", dir.display(), e))
            })?;
        }
        let dir_arg = dir.to_string_lossy().to_string();
        self.git.run(
            &repo,
            &["worktree", "add", "-b", name, &dir_arg, &start],
        )?;

        match seeded_from {
            Some(base) => {
                let message = seed_message(name, base);
                self.stage_and_commit(&dir, &message, command::DEFAULT_IDENTITY)
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    fn delete_branch(&self, record: &ProjectRecord, name: &str) -> Result<(), VcsError> {
        self.remove_branch(&record.project_id, name)
    }

    fn materialize(&self, record: &mut ProjectRecord, branch: &str) -> Result<FileNode, VcsError> {
        let dir = self.branch_dir(record, branch)?;
        self.refresh(record, branch, &dir)
    }

    fn write_working_tree(
        &self,
        record: &mut ProjectRecord,
        branch: &str,
        tree: FileNode,
    ) -> Result<(), VcsError> {
        validate_tree(&tree)?;
        worktree::check_reserved_names(&tree)?;
        let dir = self.branch_dir(record, branch)?;
        let stats = write_tree(&dir, &tree)?;
        debug!(
            project = %record.project_id,
            branch,
            written = stats.written,
            unchanged = stats.unchanged,
            removed = stats.removed,
            "wrote working tree"
        );
        self.refresh(record, branch, &dir)?;
        Ok(())
    }

    fn commit(
        &self,
        record: &mut ProjectRecord,
        branch: &str,
        message: &str,
        author: &str,
    ) -> Result<Commit, VcsError> {
        let dir = self.branch_dir(record, branch)?;
        let commit = self.stage_and_commit(&dir, message, author)?;
        self.refresh(record, branch, &dir)?;
        record.require_branch_mut(branch)?.append_commit(commit.clone());
        Ok(commit)
    }

    fn restore(
        &self,
        record: &mut ProjectRecord,
        branch: &str,
        commit_id: &str,
    ) -> Result<FileNode, VcsError> {
        let dir = self.branch_dir(record, branch)?;
        record.require_branch(branch)?.require_commit(commit_id)?;
        // Index and files only. The branch ref stays put so history is never rewritten.
        self.git
            .run(&dir, &["read-tree", "--reset", "-u", commit_id])?;
        self.git.run(&dir, &["clean", "-fdxq"])?;
        self.refresh(record, branch, &dir)
    }

    fn merge(
        &self,
        record: &mut ProjectRecord,
        source: &str,
        target: &str,
        author: &str,
    ) -> Result<MergeOutcome, VcsError> {
        record.require_branch(source)?;
        let dir = self.branch_dir(record, target)?;
        if self.git.is_dirty(&dir)? {
            return Err(VcsError::InvalidOperation(format!(
                "branch {} has uncommitted changes; commit or restore before merging",
                target
            )));
        }

        let previous = self.git.rev_parse(&dir, "HEAD")?;
        let message = merge_message(source, target);
        let source_ref = format!("refs/heads/{}", source);
        let args: [&str; 6] = ["merge", "--no-ff", "--no-edit", "-m", &message, &source_ref];
        let output = self.git.output(&dir, &args, author)?;

        if output.status.success() {
            let head = self.git.rev_parse(&dir, "HEAD")?;
            if head == previous {
                let tree = self.refresh(record, target, &dir)?;
                return Ok(MergeOutcome {
                    state: MergeState::Complete,
                    source: source.to_string(),
                    target: target.to_string(),
                    conflicts: Vec::new(),
                    tree,
                    commit: None,
                    summary: Some("Already up to date".to_string()),
                });
            }
            let commit = match self.head_commit(&dir, &message, author) {
                Ok(commit) => commit,
                Err(err) => {
                    // The target was clean before the merge
                    warn!(dir = %dir.display(), error = %err, "rolling back native merge");
                    let reset = self.git.run(&dir, &["reset", "-q", "--hard", &previous]);
                    if let Err(reset) = reset {
                        warn!(dir = %dir.display(), error = %reset, "rollback failed");
                    }
                    return Err(err);
                }
            };
            let tree = self.refresh(record, target, &dir)?;
            let target_branch = record.require_branch_mut(target)?;
            target_branch.last_merged_from = Some(source.to_string());
            target_branch.append_commit(commit.clone());
            return Ok(MergeOutcome {
                state: MergeState::Complete,
                source: source.to_string(),
                target: target.to_string(),
                conflicts: Vec::new(),
                tree,
                commit: Some(commit),
                summary: Some(format!("Merged {} into {}", source, target)),
            });
        }

        let conflicts = self.git.unmerged_paths(&dir)?;
        if conflicts.is_empty() {
            let err = command::failure(&args, &output);
            let aborted = self.git.merge_in_progress(&dir).and_then(|stopped| {
                if stopped {
                    self.git.run(&dir, &["merge", "--abort"]).map(|_| ())
                } else {
                    Ok(())
                }
            });
            if let Err(abort) = aborted {
                warn!(dir = %dir.display(), error = %abort, "merge abort failed");
            }
            return Err(err);
        }

        let tree = self.refresh(record, target, &dir)?;
        let summary = format!(
            "{} conflicting path(s) merging {} into {}",
            conflicts.len(),
            source,
            target
        );
        record.require_branch_mut(target)?.pending_merge = Some(PendingMerge {
            source: source.to_string(),
            author: author.to_string(),
            conflicts: conflicts.clone(),
            started_at: Utc::now(),
        });
        Ok(MergeOutcome {
            state: MergeState::Conflicted,
            source: source.to_string(),
            target: target.to_string(),
            conflicts,
            tree,
            commit: None,
            summary: Some(summary),
        })
    }

    fn resolve_conflicts(
        &self,
        record: &mut ProjectRecord,
        target: &str,
        resolved: FileNode,
        message: &str,
    ) -> Result<Commit, VcsError> {
        let dir = self.branch_dir(record, target)?;
        let pending = record
            .require_branch(target)?
            .pending_merge
            .clone()
            .ok_or_else(|| {
                VcsError::InvalidOperation(format!("no merge in progress on {}", target))
            })?;
        validate_tree(&resolved)?;
        worktree::check_reserved_names(&resolved)?;

        write_tree(&dir, &resolved)?;
        let commit = self.stage_and_commit(&dir, message, &pending.author)?;
        self.refresh(record, target, &dir)?;

        let target_branch = record.require_branch_mut(target)?;
        target_branch.last_merged_from = Some(pending.source);
        target_branch.pending_merge = None;
        target_branch.append_commit(commit.clone());
        Ok(commit)
    }

    fn abort_merge(&self, record: &mut ProjectRecord, target: &str) -> Result<FileNode, VcsError> {
        let dir = self.branch_dir(record, target)?;
        if record.require_branch(target)?.pending_merge.is_none() {
            return Err(VcsError::InvalidOperation(format!(
                "no merge in progress on {}",
                target
            )));
        }
        self.git.run(&dir, &["merge", "--abort"])?;
        let tree = self.refresh(record, target, &dir)?;
        record.require_branch_mut(target)?.pending_merge = None;
        Ok(tree)
    }

    fn rollback(&self, recorded: &ProjectRecord) -> Result<(), VcsError> {
        let project = &recorded.project_id;
        let repo = self.repository_dir(project)?;
        if !repo.join(worktree::GIT_DIR_NAME).exists() {
            return Ok(());
        }
        let root = self.git.rev_parse(&repo, ROOT_REF)?;
        let native = self.git.local_branches(&repo)?;
        for name in native.iter().filter(|n| !recorded.has_branch(n)) {
            warn!(project = %project, branch = %name, "removing unrecorded branch");
            self.remove_branch(project, name)?;
        }
        for branch in &recorded.branches {
            self.reconcile_branch(project, branch, &native, &root)?;
        }
        Ok(())
    }
}
