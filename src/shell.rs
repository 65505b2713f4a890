// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command execution.
//!
//! Run external programs to completion and capture what they print. Every
//! call blocks until the subprocess exits. There is no timeout.

use std::{
    ffi::OsStr,
    path::Path,
    process::Command,
};
use tracing::{debug, instrument};

/// Captured result of a finished command.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output with trailing newline chomped.
    pub stdout: String,

    /// Standard error with trailing newline chomped.
    pub stderr: String,

    /// Exit code, or `None` if the process was killed by a signal.
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Command exited with status zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Run external commands.
pub trait Runner {
    /// Run command with arguments, optionally inside a working directory.
    ///
    /// A nonzero exit is __not__ an error at this level. Callers decide what
    /// a failed exit means through [`CommandOutput::success`].
    fn run(
        &self,
        cmd: impl AsRef<OsStr>,
        args: impl IntoIterator<Item = impl AsRef<OsStr>>,
        cwd: Option<&Path>,
    ) -> Result<CommandOutput>;
}

/// Run commands as child processes of the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    /// Construct new system runner.
    pub fn new() -> Self {
        Self
    }
}

impl Runner for SystemRunner {
    /// Run command as a child process.
    ///
    /// # Errors
    ///
    /// - Return [`ShellError::Spawn`] if the command cannot be started, e.g.,
    ///   it is not installed.
    #[instrument(skip(self, cmd, args), level = "debug")]
    fn run(
        &self,
        cmd: impl AsRef<OsStr>,
        args: impl IntoIterator<Item = impl AsRef<OsStr>>,
        cwd: Option<&Path>,
    ) -> Result<CommandOutput> {
        let mut command = Command::new(cmd.as_ref());
        command.args(args);
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        debug!("run {command:?}");
        let output = command.output().map_err(|err| ShellError::Spawn {
            source: err,
            command: cmd.as_ref().to_string_lossy().into_owned(),
        })?;

        Ok(CommandOutput {
            stdout: chomp(String::from_utf8_lossy(output.stdout.as_slice()).into_owned()),
            stderr: chomp(String::from_utf8_lossy(output.stderr.as_slice()).into_owned()),
            code: output.status.code(),
        })
    }
}

// INVARIANT: Chomp trailing newlines.
fn chomp(message: String) -> String {
    message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message)
}

/// External command error types.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// Command could not be started.
    #[error("failed to run command {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ShellError> = std::result::Result<T, E>;
