// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Personal development environment manager.
//!
//! Devenv keeps dotfiles in a version controlled __source directory__ and
//! links them into the user's home directory. New files can be captured from
//! the home directory back into the source directory, where they are
//! committed and replaced by links. Devenv also keeps track of other
//! repositories cloned through it, so they can be updated by name.
//!
//! # Layout
//!
//! - [`dots`] holds the synchronization engine that initializes, applies,
//!   refreshes, and captures dotfiles.
//! - [`repo`] holds the tracker for cloned repositories.
//! - [`vcs`] is the version control capability both of them go through.
//! - [`config`] holds the configuration layout and the store that persists it.
//! - [`shell`] runs external commands like `git`.
//! - [`path`] locates the home directory and default file locations.

pub mod config;
pub mod dots;
pub mod path;
pub mod repo;
pub mod shell;
pub mod vcs;

pub use config::{
    Config, ConfigStore, DotfilesSettings, MemoryConfigStore, RepoSettings, TomlConfigStore,
    TrackedRepo,
};
pub use dots::{
    resolve::{LinkEntry, PathResolver},
    Dotfiles, DotsError,
};
pub use repo::{RepoError, Repos, UpdateFailure};
pub use shell::{CommandOutput, Runner, SystemRunner};
pub use vcs::{GitCli, VersionControl};
