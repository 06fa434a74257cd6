//! Branch Directory
//!
//! Validation and bookkeeping for the named branches of one project record.
//! Native side effects (git refs, worktrees) belong to the repository backend;
//! the engine calls the directory first so every backend sees the same rules.

use crate::branch::model::{Branch, Commit, ProjectRecord};
use crate::error::VcsError;
use crate::types::DEFAULT_BRANCH;

/// Reject names that cannot serve as a branch name in either backend.
pub fn validate_branch_name(name: &str) -> Result<(), VcsError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        Some("name contains whitespace or control characters")
    } else if name.starts_with('-') || name.starts_with('/') || name.starts_with('.') {
        Some("name starts with '-', '/' or '.'")
    } else if name.ends_with('/') || name.ends_with(".lock") || name.ends_with('.') {
        Some("name ends with '/', '.' or '.lock'")
    } else if name.contains("..") || name.contains("//") || name.contains("@{") {
        Some("name contains '..', '//' or '@{'")
    } else if name.chars().any(|c| matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\')) {
        Some("name contains a reserved character")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(VcsError::InvalidOperation(format!(
            "invalid branch name {:?}: {}",
            name, reason
        ))),
        None => Ok(()),
    }
}

/// True when one name is a `/`-separated prefix of the other, as `feature` and
/// `feature/login` are. Git cannot hold both as refs.
fn names_nest(a: &str, b: &str) -> bool {
    let nested = |outer: &str, inner: &str| {
        inner.len() > outer.len()
            && inner.starts_with(outer)
            && inner[outer.len()..].starts_with('/')
    };
    nested(a, b) || nested(b, a)
}

/// Provenance message for the synthetic commit that seeds a new branch.
pub fn seed_message(name: &str, base: &Branch) -> String {
    match base.head_id() {
        Some(head) => format!(
            "Create branch {} from {} at {}",
            name,
            base.name,
            &head[..head.len().min(12)]
        ),
        None => format!("Create branch {} from {}", name, base.name),
    }
}

/// Branch operations over a borrowed project record.
pub struct BranchDirectory<'a> {
    record: &'a mut ProjectRecord,
}

impl<'a> BranchDirectory<'a> {
    pub fn new(record: &'a mut ProjectRecord) -> Self {
        Self { record }
    }

    /// Branch names in creation order.
    pub fn list_branches(&self) -> Vec<String> {
        list_branches(self.record)
    }

    pub fn active_branch(&self) -> &str {
        &self.record.active_branch
    }

    /// Check that `name` may be created from `base`.
    ///
    /// Returns the base branch when one was named.
    pub fn check_create(&self, name: &str, base: Option<&str>) -> Result<Option<&Branch>, VcsError> {
        validate_branch_name(name)?;
        if self.record.has_branch(name) {
            return Err(VcsError::BranchExists(name.to_string()));
        }
        if let Some(clash) = self.record.branches.iter().find(|b| names_nest(&b.name, name)) {
            return Err(VcsError::InvalidOperation(format!(
                "branch {:?} nests with existing branch {:?}",
                name, clash.name
            )));
        }
        match base {
            Some(base) => self.record.require_branch(base).map(Some),
            None => Ok(None),
        }
    }

    /// Insert a validated branch, seeded with `seed` when the base had history.
    pub fn insert_branch(&mut self, name: &str, seed: Option<Commit>) -> Result<&Branch, VcsError> {
        if self.record.has_branch(name) {
            return Err(VcsError::BranchExists(name.to_string()));
        }
        self.record.branches.push(Branch::new(name, seed));
        self.record.touch();
        self.record.require_branch(name)
    }

    /// Move the active pointer. Working trees are left alone.
    pub fn switch_active_branch(&mut self, name: &str) -> Result<(), VcsError> {
        self.record.require_branch(name)?;
        self.record.active_branch = name.to_string();
        self.record.touch();
        Ok(())
    }

    /// Check that `name` may be deleted.
    pub fn check_delete(&self, name: &str) -> Result<(), VcsError> {
        if name == DEFAULT_BRANCH {
            return Err(VcsError::InvariantViolation(format!(
                "branch {} can never be deleted",
                DEFAULT_BRANCH
            )));
        }
        self.record.require_branch(name)?;
        if self.record.active_branch == name {
            return Err(VcsError::InvariantViolation(format!(
                "branch {} is active; switch to another branch first",
                name
            )));
        }
        if self.record.branches.len() <= 1 {
            return Err(VcsError::InvariantViolation(
                "cannot delete the last remaining branch".to_string(),
            ));
        }
        Ok(())
    }

    /// Remove a branch and its whole history.
    pub fn remove_branch(&mut self, name: &str) -> Result<Branch, VcsError> {
        self.check_delete(name)?;
        let index = self
            .record
            .branches
            .iter()
            .position(|b| b.name == name)
            .ok_or_else(|| VcsError::BranchNotFound(name.to_string()))?;
        self.record.touch();
        Ok(self.record.branches.remove(index))
    }
}

/// Branch names of a record in creation order.
pub fn list_branches(record: &ProjectRecord) -> Vec<String> {
    record.branches.iter().map(|b| b.name.clone()).collect()
}
