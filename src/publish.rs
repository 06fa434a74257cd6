//! Publish hook
//!
//! When a merge, conflict resolution or restore lands on the published branch,
//! the engine hands the resulting tree to an outer collaborator so it can update
//! the project's visible state and notify connected users. Delivery is one-way:
//! a failing hook is logged and never undoes the version-control operation.

use crate::tree::FileNode;
use crate::types::ProjectId;

/// Receives trees that became the published state of a project.
pub trait PublishHook: Send + Sync {
    fn publish(&self, project: &ProjectId, branch: &str, tree: &FileNode) -> Result<(), String>;
}

/// Hook that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl PublishHook for NoopPublisher {
    fn publish(&self, _project: &ProjectId, _branch: &str, _tree: &FileNode) -> Result<(), String> {
        Ok(())
    }
}

impl<F> PublishHook for F
where
    F: Fn(&ProjectId, &str, &FileNode) -> Result<(), String> + Send + Sync,
{
    fn publish(&self, project: &ProjectId, branch: &str, tree: &FileNode) -> Result<(), String> {
        self(project, branch, tree)
    }
}
