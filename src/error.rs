//! Error types
//!
//! `VcsError` is what every engine operation returns. Each variant maps onto a
//! stable [`ErrorKind`] so outer services can translate failures into
//! user-facing categories without matching on messages.

use thiserror::Error;

/// Stable error categories shared by every repository backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    InvariantViolation,
    InvalidPath,
    InvalidOperation,
    BackendFailure,
    ConflictPending,
    Configuration,
}

impl ErrorKind {
    /// Short machine-readable slug, e.g. for status mapping in an HTTP layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::InvariantViolation => "invariant_violation",
            ErrorKind::InvalidPath => "invalid_path",
            ErrorKind::InvalidOperation => "invalid_operation",
            ErrorKind::BackendFailure => "backend_failure",
            ErrorKind::ConflictPending => "conflict_pending",
            ErrorKind::Configuration => "configuration",
        }
    }
}

/// Errors from version-control operations
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Commit {commit} not found on branch {branch}")]
    CommitNotFound { branch: String, commit: String },

    #[error("Branch already exists: {0}")]
    BranchExists(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Branch {0} has an unresolved merge conflict")]
    ConflictPending(String),

    #[error("Backend failure: {0}")]
    BackendFailure(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl VcsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VcsError::BranchNotFound(_) | VcsError::CommitNotFound { .. } => ErrorKind::NotFound,
            VcsError::BranchExists(_) => ErrorKind::AlreadyExists,
            VcsError::InvariantViolation(_) => ErrorKind::InvariantViolation,
            VcsError::InvalidPath(_) => ErrorKind::InvalidPath,
            VcsError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            VcsError::ConflictPending(_) => ErrorKind::ConflictPending,
            VcsError::BackendFailure(_) | VcsError::StorageError(_) => ErrorKind::BackendFailure,
            VcsError::ConfigError(_) => ErrorKind::Configuration,
        }
    }
}

impl From<config::ConfigError> for VcsError {
    fn from(err: config::ConfigError) -> Self {
        VcsError::ConfigError(err.to_string())
    }
}

/// Errors from the snapshot store and on-disk materialization
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}
