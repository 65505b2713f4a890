// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository tracking.
//!
//! Clone repositories into a common directory and remember where they went,
//! so they can be pulled later by name. What devenv knows about each tracked
//! repository lives in the `repos.tracked` table of the configuration.
//!
//! A tracked repository is named after the last path segment of its URL,
//! minus any `.git` suffix. Thus `https://example.org/user/devenv.git` and
//! `git@example.org:user/devenv` both become `devenv`.

use crate::{
    config::{ConfigError, ConfigStore, TomlConfigStore, TrackedRepo},
    path::normalize,
    shell::ShellError,
    vcs::{GitCli, VcsError, VersionControl},
};

use chrono::Utc;
use std::{
    collections::BTreeMap,
    fs::{create_dir_all, remove_dir_all},
    path::{absolute, Path, PathBuf},
};
use tracing::{info, instrument, warn};

/// Repository tracker.
///
/// Like the dotfile engine, configuration is loaded in full at the start of
/// every operation and saved in full only after it succeeds.
#[derive(Debug)]
pub struct Repos<V = GitCli, S = TomlConfigStore>
where
    V: VersionControl,
    S: ConfigStore,
{
    vcs: V,
    store: S,
}

impl<V, S> Repos<V, S>
where
    V: VersionControl,
    S: ConfigStore,
{
    /// Construct new repository tracker.
    pub fn new(vcs: V, store: S) -> Self {
        Self { vcs, store }
    }

    /// Clone repository at `url` into repository directory and track it.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::InvalidUrl`] if no name can be taken from `url`.
    /// - Return [`RepoError::AlreadyTracked`] if a repository of the same
    ///   name is already tracked.
    /// - Return [`RepoError::CloneFailed`] if cloning fails. Nothing is
    ///   tracked in that case.
    /// - Return [`RepoError::Filesystem`] if repository directory cannot be
    ///   created.
    #[instrument(skip(self), level = "debug")]
    pub fn clone_repo(&self, url: &str) -> Result<(String, TrackedRepo)> {
        let mut config = self.store.load()?;
        let name = repo_name(url).ok_or_else(|| RepoError::InvalidUrl { url: url.into() })?;
        if config.repos.tracked.contains_key(&name) {
            return Err(RepoError::AlreadyTracked { name });
        }

        let repos_dir = absolute_path(&config.repos.dir)?;
        create_dir_all(&repos_dir).map_err(|err| RepoError::Filesystem {
            source: err,
            op: "create directory",
            path: repos_dir.clone(),
        })?;

        let path = repos_dir.join(&name);
        info!("clone {url:?} into {:?}", path.display());
        self.vcs.clone_repo(url, &path).map_err(|err| {
            RepoError::from_vcs(err, |stderr| RepoError::CloneFailed {
                url: url.into(),
                stderr,
            })
        })?;

        let repo = TrackedRepo {
            url: url.into(),
            path,
            description: None,
            last_updated: Utc::now(),
        };
        config.repos.tracked.insert(name.clone(), repo.clone());
        self.store.save(&config)?;

        Ok((name, repo))
    }

    /// Pull latest changes into tracked repository.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotTracked`] if no repository is tracked under
    ///   `name`.
    /// - Return [`RepoError::PullFailed`] if pulling fails.
    #[instrument(skip(self), level = "debug")]
    pub fn update(&self, name: &str) -> Result<TrackedRepo> {
        let mut config = self.store.load()?;
        let repo = config
            .repos
            .tracked
            .get_mut(name)
            .ok_or_else(|| RepoError::NotTracked { name: name.into() })?;

        info!("pull latest changes into {name}");
        self.vcs.pull(&repo.path).map_err(|err| {
            RepoError::from_vcs(err, |stderr| RepoError::PullFailed {
                name: name.into(),
                stderr,
            })
        })?;

        repo.last_updated = Utc::now();
        let repo = repo.clone();
        self.store.save(&config)?;

        Ok(repo)
    }

    /// Pull latest changes into every tracked repository.
    ///
    /// A failure on one repository does not stop the others from being
    /// updated. Failures are collected and returned in name order.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::Config`] if configuration cannot be loaded.
    #[instrument(skip(self), level = "debug")]
    pub fn update_all(&self) -> Result<Vec<UpdateFailure>> {
        let names = self.store.load()?.repos.tracked.into_keys().collect::<Vec<_>>();

        let mut failures = Vec::new();
        for name in names {
            if let Err(error) = self.update(&name) {
                warn!("failed to update {name}: {error}");
                failures.push(UpdateFailure { name, error });
            }
        }

        Ok(failures)
    }

    /// List tracked repositories by name.
    pub fn list(&self) -> Result<BTreeMap<String, TrackedRepo>> {
        Ok(self.store.load()?.repos.tracked)
    }

    /// Stop tracking repository, leaving its clone in place.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotTracked`] if no repository is tracked under
    ///   `name`.
    #[instrument(skip(self), level = "debug")]
    pub fn remove(&self, name: &str) -> Result<TrackedRepo> {
        let mut config = self.store.load()?;
        let repo = config
            .repos
            .tracked
            .remove(name)
            .ok_or_else(|| RepoError::NotTracked { name: name.into() })?;
        self.store.save(&config)?;
        info!("stopped tracking {name}");

        Ok(repo)
    }

    /// Stop tracking repository, and delete its clone.
    ///
    /// A clone that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// - Return [`RepoError::NotTracked`] if no repository is tracked under
    ///   `name`.
    /// - Return [`RepoError::Filesystem`] if clone cannot be deleted. The
    ///   repository stays tracked in that case.
    #[instrument(skip(self), level = "debug")]
    pub fn delete(&self, name: &str) -> Result<TrackedRepo> {
        let mut config = self.store.load()?;
        let repo = config
            .repos
            .tracked
            .remove(name)
            .ok_or_else(|| RepoError::NotTracked { name: name.into() })?;

        if repo.path.exists() {
            remove_dir_all(&repo.path).map_err(|err| RepoError::Filesystem {
                source: err,
                op: "delete",
                path: repo.path.clone(),
            })?;
        }

        self.store.save(&config)?;
        info!("deleted {name} at {:?}", repo.path.display());

        Ok(repo)
    }
}

/// Repository that could not be updated.
#[derive(Debug)]
pub struct UpdateFailure {
    /// Name of tracked repository.
    pub name: String,

    /// Reason update failed.
    pub error: RepoError,
}

/// Determine name of repository from its URL.
///
/// Returns `None` if URL has no usable last segment.
pub fn repo_name(url: &str) -> Option<String> {
    let segment = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()?
        .trim_end_matches(".git");

    match segment {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    absolute(path)
        .map(normalize)
        .map_err(|err| RepoError::Filesystem {
            source: err,
            op: "resolve",
            path: path.to_path_buf(),
        })
}

/// Repository tracking error types.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// No repository name can be taken from URL.
    #[error("cannot determine repository name from {url:?}")]
    InvalidUrl { url: String },

    /// Repository of the same name is already tracked.
    #[error("repository {name:?} is already tracked")]
    AlreadyTracked { name: String },

    /// No repository is tracked under name.
    #[error("repository not found: {name}")]
    NotTracked { name: String },

    /// Repository could not be cloned.
    #[error("failed to clone repository {url:?}: {stderr}")]
    CloneFailed { url: String, stderr: String },

    /// Latest changes could not be pulled.
    #[error("failed to update repository {name:?}: {stderr}")]
    PullFailed { name: String, stderr: String },

    /// Filesystem operation failed.
    #[error("failed to {op} {:?}", path.display())]
    Filesystem {
        #[source]
        source: std::io::Error,
        op: &'static str,
        path: PathBuf,
    },

    /// Configuration could not be loaded or saved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Git could not be run at all.
    #[error(transparent)]
    Shell(#[from] ShellError),
}

impl RepoError {
    fn from_vcs(err: VcsError, failed: impl FnOnce(String) -> Self) -> Self {
        match err {
            VcsError::CommandFailed { stderr, .. } => failed(stderr),
            VcsError::Shell(err) => Self::Shell(err),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = RepoError> = std::result::Result<T, E>;
