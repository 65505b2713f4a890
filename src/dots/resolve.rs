// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Map dotfiles between the source directory and the home directory.
//!
//! # Eligibility
//!
//! Not every entry of the source directory gets linked into the home
//! directory. The rules are:
//!
//! 1. The `.git` directory and everything beneath it is never linked.
//! 2. A top-level entry is linked only if its name starts with a dot, so
//!    `.bashrc` is linked but `README.md` is not.
//! 3. Any entry nested inside a subdirectory is linked regardless of its name,
//!    so `sub/config` is linked.
//!
//! Rule 2 only applies to the top-level. This asymmetry is kept for
//! compatibility with existing dotfile repositories.
//!
//! Only regular files are ever linked. Directories are recreated on the home
//! side as needed.

use std::{
    ffi::OsStr,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Component, Path, PathBuf},
};

/// Name of version control metadata directory.
pub const VCS_DIR: &str = ".git";

/// Symbolic link from the home directory into the source directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkEntry {
    /// Absolute path of file inside source directory.
    pub source: PathBuf,

    /// Absolute path of link inside home directory.
    pub target: PathBuf,
}

impl Display for LinkEntry {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{} -> {}", self.target.display(), self.source.display())
    }
}

/// Resolve paths between a source directory and a home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    source_dir: PathBuf,
    home_dir: PathBuf,
}

impl PathResolver {
    /// Construct new path resolver.
    pub fn new(source_dir: impl Into<PathBuf>, home_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            home_dir: home_dir.into(),
        }
    }

    pub fn source_dir(&self) -> &Path {
        self.source_dir.as_path()
    }

    /// Determine link entry for path relative to source directory.
    ///
    /// Returns `None` if the entry is not eligible for linking.
    pub fn link_entry(&self, relative: impl AsRef<Path>) -> Option<LinkEntry> {
        let relative = relative.as_ref();
        if !is_eligible(relative) {
            return None;
        }

        Some(LinkEntry {
            source: self.source_dir.join(relative),
            target: target_location(&self.home_dir, relative),
        })
    }

    /// Strip source directory prefix off of absolute path.
    pub fn source_relative<'p>(&self, path: &'p Path) -> Option<&'p Path> {
        path.strip_prefix(&self.source_dir).ok()
    }

    /// Strip home directory prefix off of absolute path.
    ///
    /// Returns `None` if the path is not inside the home directory. Matching
    /// is done by whole components, so `/home/al` does not contain
    /// `/home/alice/.bashrc`. Paths are compared as given, so a remainder
    /// holding `.` or `..` is rejected rather than trusted.
    pub fn home_relative<'p>(&self, path: &'p Path) -> Option<&'p Path> {
        path.strip_prefix(&self.home_dir).ok().filter(|relative| {
            !relative.as_os_str().is_empty()
                && relative
                    .components()
                    .all(|component| matches!(component, Component::Normal(_)))
        })
    }

    /// Mirror path relative to home directory into source directory.
    pub fn source_location(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.source_dir.join(relative)
    }
}

/// Determine if path relative to source directory can be linked.
///
/// See the [module documentation](self) for the eligibility rules.
pub fn is_eligible(relative: impl AsRef<Path>) -> bool {
    let components = relative
        .as_ref()
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .collect::<Vec<_>>();

    if components.iter().any(|name| *name == OsStr::new(VCS_DIR)) {
        return false;
    }

    match components.as_slice() {
        [] => false,
        [name] => name.to_string_lossy().starts_with('.'),
        _ => true,
    }
}

/// Determine location in home directory for path relative to source directory.
pub fn target_location(home_dir: impl AsRef<Path>, relative: impl AsRef<Path>) -> PathBuf {
    home_dir.as_ref().join(relative)
}
