// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout and persistence.
//!
//! Specify the layout of devenv's configuration file, and provide the
//! __configuration store__ that loads and saves it. The dotfile engine reads
//! the store in full at the start of an operation, and writes it back in full
//! only after a state-changing operation succeeds.
//!
//! # General Layout
//!
//! ```toml
//! [dotfiles]
//! dir = "~/.dotfiles"
//! repo = "https://example.org/dotfiles.git"
//!
//! [repos]
//! dir = "~/Projects"
//!
//! [repos.tracked.devenv]
//! url = "https://example.org/devenv.git"
//! path = "/home/user/Projects/devenv"
//! last_updated = "2025-01-01T00:00:00Z"
//! ```
//!
//! Both `dir` fields go through full shell expansion when parsed, so both
//! `~` and environment variables are allowed. The `repo` field is only
//! present once a dotfiles repository has been cloned through devenv. The
//! `repos.tracked` table maps repository names to what devenv knows about
//! them, and is kept up to date by the [`repo`](crate::repo) tracker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::{create_dir_all, read_to_string, write},
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};

/// Devenv configuration layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Settings for dotfile management.
    #[serde(default)]
    pub dotfiles: DotfilesSettings,

    /// Settings for repository tracking.
    #[serde(default)]
    pub repos: RepoSettings,
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: Config = toml::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on directory fields.
        config.dotfiles.dir = expand(&config.dotfiles.dir)?;
        config.repos.dir = expand(&config.repos.dir)?;

        Ok(config)
    }
}

fn expand(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Dotfile management settings.
///
/// Holds the location of the dotfiles source directory, and the remote
/// repository it was cloned from (if any).
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct DotfilesSettings {
    /// Path to dotfiles source directory.
    #[serde(default = "default_dotfiles_dir")]
    pub dir: PathBuf,

    /// Remote URL the dotfiles source directory was cloned from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

impl Default for DotfilesSettings {
    fn default() -> Self {
        Self {
            dir: default_dotfiles_dir(),
            repo: None,
        }
    }
}

fn default_dotfiles_dir() -> PathBuf {
    PathBuf::from("~/.dotfiles")
}

/// Repository tracking settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct RepoSettings {
    /// Directory new repositories are cloned into.
    #[serde(default = "default_repos_dir")]
    pub dir: PathBuf,

    /// Tracked repositories keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tracked: BTreeMap<String, TrackedRepo>,
}

impl Default for RepoSettings {
    fn default() -> Self {
        Self {
            dir: default_repos_dir(),
            tracked: BTreeMap::new(),
        }
    }
}

fn default_repos_dir() -> PathBuf {
    PathBuf::from("~/Projects")
}

/// Repository tracked by devenv.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct TrackedRepo {
    /// Remote URL repository was cloned from.
    pub url: String,

    /// Absolute path to local clone.
    pub path: PathBuf,

    /// Free-form note about repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Last time repository was cloned or pulled through devenv.
    pub last_updated: DateTime<Utc>,
}

/// Load and save devenv configuration.
pub trait ConfigStore {
    /// Load configuration in full.
    fn load(&self) -> Result<Config>;

    /// Save configuration in full.
    fn save(&self, config: &Config) -> Result<()>;
}

/// Configuration store backed by a TOML file on disk.
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    /// Construct new file-backed configuration store.
    ///
    /// Nothing is read or written until [`ConfigStore::load`] or
    /// [`ConfigStore::save`] are called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path to configuration file.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}

impl ConfigStore for TomlConfigStore {
    /// Load configuration file.
    ///
    /// Writes out default configuration if the file does not exist yet.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ReadConfig`] if file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file content is invalid.
    /// - Return [`ConfigError::ShellExpansion`] if dotfiles directory cannot
    ///   be expanded.
    fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            info!("create default configuration at {:?}", self.path.display());
            let config: Config = "".parse()?;
            self.save(&config)?;
            return Ok(config);
        }

        debug!("load configuration from {:?}", self.path.display());
        read_to_string(&self.path)
            .map_err(|err| ConfigError::ReadConfig {
                source: err,
                path: self.path.clone(),
            })?
            .parse()
    }

    /// Save configuration file.
    ///
    /// Creates parent directories of configuration file if needed.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::WriteConfig`] if file or its parent directories
    ///   cannot be written.
    fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            create_dir_all(parent).map_err(|err| ConfigError::WriteConfig {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        let content = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
        write(&self.path, content).map_err(|err| ConfigError::WriteConfig {
            source: err,
            path: self.path.clone(),
        })
    }
}

/// Configuration store held in memory.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: RefCell<Config>,
}

impl MemoryConfigStore {
    /// Construct new in-memory store holding given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config: RefCell::new(config),
        }
    }

    /// Current configuration held by store.
    pub fn current(&self) -> Config {
        self.config.borrow().clone()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Config> {
        Ok(self.current())
    }

    fn save(&self, config: &Config) -> Result<()> {
        *self.config.borrow_mut() = config.clone();
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Configuration file cannot be read from.
    #[error("failed to read configuration at {:?}", path.display())]
    ReadConfig {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Configuration file cannot be written to.
    #[error("failed to write configuration at {:?}", path.display())]
    WriteConfig {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;
