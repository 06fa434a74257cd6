//! StorageConfig and resolve_paths for workspace storage.

use crate::config::xdg;
use crate::error::VcsError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Storage configuration
///
/// Relative paths resolve against the workspace root. When unset, both live
/// under the workspace's XDG data directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// sled directory holding project records
    #[serde(default)]
    pub store_path: Option<PathBuf>,

    /// Directory holding one git repository per project
    #[serde(default)]
    pub repositories_path: Option<PathBuf>,
}

/// Resolved storage locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub store: PathBuf,
    pub repositories: PathBuf,
}

impl StorageConfig {
    /// Resolve storage paths to actual filesystem locations.
    pub fn resolve_paths(&self, workspace_root: &Path) -> Result<StoragePaths, VcsError> {
        let store = match &self.store_path {
            Some(path) => workspace_root.join(path),
            None => xdg::workspace_data_dir(workspace_root)?.join("store"),
        };
        let repositories = match &self.repositories_path {
            Some(path) => workspace_root.join(path),
            None => xdg::workspace_data_dir(workspace_root)?.join("repositories"),
        };
        Ok(StoragePaths {
            store,
            repositories,
        })
    }
}
