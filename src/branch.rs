//! Branches: the per-project record, its commits, and the directory rules.

pub mod directory;
pub mod model;

pub use directory::{list_branches, seed_message, validate_branch_name, BranchDirectory};
pub use model::{Branch, Commit, PendingMerge, ProjectRecord};
