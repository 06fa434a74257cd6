//! Canopy: Version Control for Project File Trees
//!
//! Branches, commits, merges and restores over folder/file trees, behind one
//! engine that runs either on a document-store snapshot log or on real git
//! repositories on disk.

pub mod backend;
pub mod branch;
pub mod concurrency;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod publish;
pub mod store;
pub mod tree;
pub mod types;
pub mod views;

pub use backend::{GitBackend, MergeOutcome, MergeState, RepositoryBackend, SnapshotLogBackend};
pub use branch::{Branch, Commit, ProjectRecord};
pub use engine::VersionControlEngine;
pub use error::{ErrorKind, StorageError, VcsError};
pub use publish::{NoopPublisher, PublishHook};
pub use store::{MemorySnapshotStore, SledSnapshotStore, SnapshotStore};
pub use tree::{FileNode, FlatFiles};
pub use types::{BackendKind, ProjectId};
pub use views::{BranchListing, CommitSummary, MergeReport};
