//! Thin wrapper over the `git` binary.

use crate::error::VcsError;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Identity used when git needs a name but no author was supplied.
pub const DEFAULT_IDENTITY: &str = "canopy";

/// Runs git subcommands inside a repository or worktree directory.
#[derive(Debug, Clone)]
pub struct GitRunner {
    binary: PathBuf,
    email: String,
}

impl GitRunner {
    pub fn new(binary: impl Into<PathBuf>, email: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            email: email.into(),
        }
    }

    /// `git --version`, used to check the binary is usable.
    pub fn version(&self) -> Result<String, VcsError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|e| {
                VcsError::BackendFailure(format!(
                    "Failed to execute {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;
        if !output.status.success() {
            return Err(VcsError::BackendFailure(format!(
                "{} --version failed",
                self.binary.display()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn command(&self, dir: &Path, identity: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-C")
            .arg(dir)
            .args(["-c", "commit.gpgsign=false"])
            .args(["-c", "core.autocrlf=false"])
            .args(["-c", "core.quotepath=false"])
            .args(["-c", "merge.conflictstyle=merge"])
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .env("GIT_AUTHOR_NAME", identity)
            .env("GIT_AUTHOR_EMAIL", &self.email)
            .env("GIT_COMMITTER_NAME", identity)
            .env("GIT_COMMITTER_EMAIL", &self.email)
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .env_remove("GIT_INDEX_FILE");
        cmd
    }

    /// Run and return the raw output whatever the exit status.
    pub fn output(&self, dir: &Path, args: &[&str], identity: &str) -> Result<Output, VcsError> {
        debug!(dir = %dir.display(), args = ?args, "git");
        self.command(dir, identity).args(args).output().map_err(|e| {
            VcsError::BackendFailure(format!("Failed to execute git {}: {}", args.join(" "), e))
        })
    }

    /// Run and return trimmed stdout; a non-zero exit is a backend failure.
    pub fn run(&self, dir: &Path, args: &[&str]) -> Result<String, VcsError> {
        self.run_as(dir, args, DEFAULT_IDENTITY)
    }

    /// Like [`GitRunner::run`] with `identity` as author and committer.
    pub fn run_as(&self, dir: &Path, args: &[&str], identity: &str) -> Result<String, VcsError> {
        let output = self.output(dir, args, identity)?;
        if !output.status.success() {
            return Err(failure(args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// `git rev-parse <rev>`
    pub fn rev_parse(&self, dir: &Path, rev: &str) -> Result<String, VcsError> {
        self.run(dir, &["rev-parse", "--verify", "--quiet", rev])
    }

    /// Committer time of a commit.
    pub fn commit_time(&self, dir: &Path, rev: &str) -> Result<i64, VcsError> {
        let raw = self.run(dir, &["show", "-s", "--format=%ct", rev])?;
        raw.parse::<i64>().map_err(|e| {
            VcsError::BackendFailure(format!("Unexpected commit time {:?}: {}", raw, e))
        })
    }

    /// Paths with unresolved merge conflicts.
    pub fn unmerged_paths(&self, dir: &Path) -> Result<Vec<String>, VcsError> {
        let raw = self.run(dir, &["diff", "--name-only", "--diff-filter=U", "-z"])?;
        let mut paths: Vec<String> = raw
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(|p| p.to_string())
            .collect();
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    /// True while a merge is stopped in this worktree.
    pub fn merge_in_progress(&self, dir: &Path) -> Result<bool, VcsError> {
        let args = ["rev-parse", "--verify", "--quiet", "MERGE_HEAD"];
        let output = self.output(dir, &args, DEFAULT_IDENTITY)?;
        Ok(output.status.success())
    }

    /// Number of parents of a commit.
    pub fn parent_count(&self, dir: &Path, rev: &str) -> Result<usize, VcsError> {
        let raw = self.run(dir, &["rev-list", "--parents", "-n", "1", rev])?;
        Ok(raw.split_whitespace().count().saturating_sub(1))
    }

    /// Path of a file inside the worktree's git directory.
    pub fn git_path(&self, dir: &Path, name: &str) -> Result<PathBuf, VcsError> {
        let raw = PathBuf::from(self.run(dir, &["rev-parse", "--git-path", name])?);
        Ok(if raw.is_absolute() { raw } else { dir.join(raw) })
    }

    /// Local branch names.
    pub fn local_branches(&self, dir: &Path) -> Result<Vec<String>, VcsError> {
        let raw = self.run(dir, &["for-each-ref", "--format=%(refname)", "refs/heads/"])?;
        Ok(raw
            .lines()
            .filter_map(|line| line.trim().strip_prefix("refs/heads/"))
            .map(str::to_string)
            .collect())
    }

    /// True when the worktree has staged, unstaged or untracked changes.
    pub fn is_dirty(&self, dir: &Path) -> Result<bool, VcsError> {
        let raw = self.run(dir, &["status", "--porcelain", "--ignored", "--untracked-files=all"])?;
        Ok(!raw.is_empty())
    }
}

/// Backend failure carrying the command line and git's own message.
pub fn failure(args: &[&str], output: &Output) -> VcsError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let detail = if stderr.trim().is_empty() {
        stdout.trim().to_string()
    } else {
        stderr.trim().to_string()
    };
    VcsError::BackendFailure(format!("git {} failed: {}", args.join(" "), detail))
}
