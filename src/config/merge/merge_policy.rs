//! Built-in defaults every configuration load starts from.

use crate::types::{BackendKind, DEFAULT_BRANCH};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with the defaults that sit beneath every file and env layer.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("engine.published_branch", DEFAULT_BRANCH)?
        .set_default("backend.kind", BackendKind::SnapshotLog.as_str())?
        .set_default("git.binary", "git")?
        .set_default("git.committer_email", crate::backend::git::DEFAULT_EMAIL)
}
