// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control of managed repositories.
//!
//! Neither the dotfile engine nor the repository tracker talk to Git
//! directly. They go through the [`VersionControl`] capability, which
//! [`GitCli`] implements by shelling out to the `git` binary found on `PATH`.
//!
//! Paths and URLs are always passed after a `--` separator, so a value that
//! starts with a dash is never read as an option.

use crate::shell::{CommandOutput, Runner, ShellError, SystemRunner};

use std::{
    ffi::{OsStr, OsString},
    path::Path,
};
use tracing::{info, instrument};

/// Version control operations needed to manage a dotfiles source directory.
pub trait VersionControl {
    /// Clone remote repository at `url` into `path`.
    fn clone_repo(&self, url: &str, path: &Path) -> Result<()>;

    /// Initialize empty repository at `path`.
    fn init(&self, path: &Path) -> Result<()>;

    /// Pull latest changes from remote into repository at `path`.
    fn pull(&self, path: &Path) -> Result<()>;

    /// Stage `file` relative to repository at `path`.
    fn add(&self, path: &Path, file: &Path) -> Result<()>;

    /// Commit staged changes of repository at `path`.
    fn commit(&self, path: &Path, message: &str) -> Result<()>;
}

/// Version control through the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli<R = SystemRunner>
where
    R: Runner,
{
    runner: R,
}

impl Default for GitCli<SystemRunner> {
    fn default() -> Self {
        Self::new(SystemRunner::new())
    }
}

impl<R> GitCli<R>
where
    R: Runner,
{
    /// Construct new Git adapter on top of given command runner.
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    fn gitcall(
        &self,
        args: impl IntoIterator<Item = impl Into<OsString>>,
        cwd: Option<&Path>,
    ) -> Result<CommandOutput> {
        let args = args.into_iter().map(Into::into).collect::<Vec<OsString>>();
        let output = self.runner.run("git", &args, cwd)?;

        if !output.success() {
            return Err(VcsError::CommandFailed {
                args: args
                    .iter()
                    .map(|arg| arg.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" "),
                stderr: output.stderr,
            });
        }

        if !output.stdout.is_empty() {
            info!("{}", output.stdout);
        }

        Ok(output)
    }
}

impl<R> VersionControl for GitCli<R>
where
    R: Runner,
{
    #[instrument(skip(self), level = "debug")]
    fn clone_repo(&self, url: &str, path: &Path) -> Result<()> {
        self.gitcall(
            [
                OsStr::new("clone"),
                OsStr::new("--"),
                OsStr::new(url),
                path.as_os_str(),
            ],
            None,
        )?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn init(&self, path: &Path) -> Result<()> {
        self.gitcall(["init"], Some(path))?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn pull(&self, path: &Path) -> Result<()> {
        self.gitcall(["pull"], Some(path))?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn add(&self, path: &Path, file: &Path) -> Result<()> {
        self.gitcall([OsStr::new("add"), OsStr::new("--"), file.as_os_str()], Some(path))?;
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn commit(&self, path: &Path, message: &str) -> Result<()> {
        self.gitcall(["commit", "-m", message], Some(path))?;
        Ok(())
    }
}

/// Version control error types.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// Git exited with nonzero status.
    #[error("git {args} failed: {stderr}")]
    CommandFailed { args: String, stderr: String },

    /// Git could not be run at all.
    #[error(transparent)]
    Shell(#[from] ShellError),
}

/// Friendly result alias :3
pub type Result<T, E = VcsError> = std::result::Result<T, E>;
