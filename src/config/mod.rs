//! Configuration
//!
//! Layered configuration for the engine, built with the `config` crate.
//! Precedence, lowest to highest: built-in defaults, the global file
//! (`$XDG_CONFIG_HOME/canopy/config.toml`), the workspace file
//! (`<workspace>/canopy.toml`), then `CANOPY__SECTION__KEY` environment variables.

pub mod facade;
pub mod merge;
pub mod paths;
pub mod sources;
pub mod workspace;

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use workspace::storage_paths::StorageConfig;

use crate::logging::LoggingConfig;
use crate::types::{BackendKind, DEFAULT_BRANCH};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Name of the per-workspace configuration file.
pub const WORKSPACE_CONFIG_FILE: &str = "canopy.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CanopyConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub git: GitConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_published_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

/// Engine behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Branch whose tree is the project's published state.
    #[serde(default = "default_published_branch")]
    pub published_branch: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            published_branch: default_published_branch(),
        }
    }
}

/// Which repository backend to run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
}

fn default_git_binary() -> PathBuf {
    PathBuf::from("git")
}

fn default_committer_email() -> String {
    crate::backend::git::DEFAULT_EMAIL.to_string()
}

/// Settings for the git backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// git executable, looked up on `PATH` when relative.
    #[serde(default = "default_git_binary")]
    pub binary: PathBuf,

    /// Email recorded on native commits; the author name is the operation's author.
    #[serde(default = "default_committer_email")]
    pub committer_email: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            binary: default_git_binary(),
            committer_email: default_committer_email(),
        }
    }
}
