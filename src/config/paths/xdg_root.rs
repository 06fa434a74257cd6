//! XDG Base Directory utilities for workspace data management.

use crate::error::VcsError;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "canopy";

/// Get XDG data home directory
///
/// Returns `$XDG_DATA_HOME` if set, otherwise defaults to `$HOME/.local/share`
pub fn data_home() -> Option<PathBuf> {
    if let Ok(xdg_data_home) = std::env::var("XDG_DATA_HOME") {
        return Some(PathBuf::from(xdg_data_home));
    }

    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".local").join("share"))
}

/// Get the data directory for a specific workspace
///
/// Returns `$XDG_DATA_HOME/canopy/<workspace_path>/`. The canonical workspace
/// path is used directly as a directory structure, so
/// `/srv/projects/acme` becomes `$XDG_DATA_HOME/canopy/srv/projects/acme/`.
pub fn workspace_data_dir(workspace_root: &Path) -> Result<PathBuf, VcsError> {
    let data_home = data_home().ok_or_else(|| {
        VcsError::ConfigError(
            "Could not determine XDG data home directory (HOME not set)".to_string(),
        )
    })?;

    let canonical = dunce::canonicalize(workspace_root).map_err(|e| {
        VcsError::ConfigError(format!("Failed to canonicalize workspace path: {}", e))
    })?;

    let mut data_dir = data_home.join(APP_DIR);
    for component in canonical.components() {
        if let std::path::Component::Normal(name) = component {
            data_dir = data_dir.join(name);
        }
    }

    Ok(data_dir)
}

/// Get XDG config home directory
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise defaults to `$HOME/.config`
pub fn config_home() -> Result<PathBuf, VcsError> {
    if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(xdg_config_home));
    }

    let home = std::env::var("HOME").map_err(|_| {
        VcsError::ConfigError(
            "Could not determine XDG config home directory (HOME not set)".to_string(),
        )
    })?;

    Ok(PathBuf::from(home).join(".config"))
}

/// `$XDG_CONFIG_HOME/canopy/config.toml`
pub fn global_config_file() -> Result<PathBuf, VcsError> {
    Ok(config_home()?.join(APP_DIR).join("config.toml"))
}
