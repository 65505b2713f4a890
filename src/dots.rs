// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile synchronization.
//!
//! Dotfiles live in a version controlled __source directory__, which is the
//! source of truth for their content. The home directory only ever holds
//! symbolic links that point back into the source directory.
//!
//! # Operations
//!
//! - __Initialize__: create the source directory, either by cloning a remote
//!   repository into it, or by initializing an empty repository in place.
//! - __Apply__: walk the source directory and link every eligible file into
//!   the home directory, replacing whatever was there before.
//! - __Refresh__: pull latest changes into the source directory. Does not
//!   apply them. Run Apply afterwards to link new files.
//! - __Capture__: copy a file from the home directory into the source
//!   directory, commit it, and replace the original with a link.
//!
//! # Capture Ordering
//!
//! Capture only deletes the original file in the home directory after the
//! copy has been committed into the source directory. If staging or committing
//! fails, the original is left exactly as it was.
//!
//! # See Also
//!
//! 1. [`resolve`] for the rules deciding which files get linked.

pub mod resolve;

use crate::{
    config::{ConfigError, ConfigStore, TomlConfigStore},
    dots::resolve::{LinkEntry, PathResolver, VCS_DIR},
    path::normalize,
    shell::ShellError,
    vcs::{GitCli, VcsError, VersionControl},
};

use ignore::WalkBuilder;
use std::{
    ffi::OsStr,
    fs::{canonicalize, copy, create_dir_all, remove_dir, remove_file, symlink_metadata},
    path::{absolute, Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Dotfile synchronization engine.
///
/// Keeps the home directory linked to the source directory recorded in the
/// configuration store. Configuration is loaded in full at the start of every
/// operation, so changes made to the store between operations are honored.
#[derive(Debug)]
pub struct Dotfiles<V = GitCli, S = TomlConfigStore>
where
    V: VersionControl,
    S: ConfigStore,
{
    vcs: V,
    store: S,
    home_dir: PathBuf,
}

impl<V, S> Dotfiles<V, S>
where
    V: VersionControl,
    S: ConfigStore,
{
    /// Construct new dotfile engine.
    pub fn new(vcs: V, store: S, home_dir: impl Into<PathBuf>) -> Self {
        Self {
            vcs,
            store,
            home_dir: home_dir.into(),
        }
    }

    /// Initialize dotfiles source directory.
    ///
    /// Clones `url` into the source directory if given, and records it in the
    /// configuration store. Otherwise, initializes an empty repository in
    /// place without touching the configuration store.
    ///
    /// # Errors
    ///
    /// - Return [`DotsError::Filesystem`] if source directory cannot be
    ///   created.
    /// - Return [`DotsError::CloneFailed`] if cloning fails.
    /// - Return [`DotsError::InitFailed`] if repository initialization fails.
    /// - Return [`DotsError::Config`] if configuration cannot be loaded or
    ///   saved.
    #[instrument(skip(self), level = "debug")]
    pub fn init(&self, url: Option<&str>) -> Result<()> {
        let mut config = self.store.load()?;
        let source_dir = absolute_path(&config.dotfiles.dir)?;

        create_dir_all(&source_dir).map_err(|err| DotsError::Filesystem {
            source: err,
            op: "create directory",
            path: source_dir.clone(),
        })?;

        match url {
            Some(url) => {
                info!("clone {url:?} into {:?}", source_dir.display());
                self.vcs.clone_repo(url, &source_dir).map_err(|err| {
                    DotsError::from_vcs(err, |stderr| DotsError::CloneFailed {
                        url: url.into(),
                        stderr,
                    })
                })?;

                config.dotfiles.repo = Some(url.into());
                self.store.save(&config)?;
            }
            None => {
                info!("initialize new dotfiles repository at {:?}", source_dir.display());
                self.vcs.init(&source_dir).map_err(|err| {
                    DotsError::from_vcs(err, |stderr| DotsError::InitFailed { stderr })
                })?;
            }
        }

        Ok(())
    }

    /// List links that apply would create.
    ///
    /// Walks source directory depth-first, visiting entries of each directory
    /// in file name order. Nothing is modified.
    ///
    /// # Errors
    ///
    /// - Return [`DotsError::SourceMissing`] if source directory does not
    ///   exist.
    /// - Return [`DotsError::Walk`] if source directory cannot be traversed.
    #[instrument(skip(self), level = "debug")]
    pub fn plan(&self) -> Result<Vec<LinkEntry>> {
        let config = self.store.load()?;
        let resolver = PathResolver::new(absolute_path(&config.dotfiles.dir)?, &self.home_dir);
        require_source(resolver.source_dir())?;

        let walker = WalkBuilder::new(resolver.source_dir())
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|lhs, rhs| lhs.cmp(rhs))
            .filter_entry(|entry| entry.file_name() != OsStr::new(VCS_DIR))
            .build();

        let mut entries = Vec::new();
        for entry in walker {
            let entry = entry?;
            if entry.file_type().is_none_or(|kind| kind.is_dir()) {
                continue;
            }

            let Some(relative) = resolver.source_relative(entry.path()) else {
                continue;
            };

            match resolver.link_entry(relative) {
                Some(link) => entries.push(link),
                None => debug!("skip {:?}", relative.display()),
            }
        }

        Ok(entries)
    }

    /// Link all eligible files of source directory into home directory.
    ///
    /// Anything already sitting at a link location is removed without
    /// comparison or backup. The first failure aborts the whole run, and links
    /// made before it are left in place.
    ///
    /// # Errors
    ///
    /// - Return [`DotsError::SourceMissing`] if source directory does not
    ///   exist.
    /// - Return [`DotsError::Walk`] if source directory cannot be traversed.
    /// - Return [`DotsError::Filesystem`] if a link cannot be made.
    #[instrument(skip(self), level = "debug")]
    pub fn apply(&self) -> Result<Vec<LinkEntry>> {
        let entries = self.plan()?;
        for entry in &entries {
            if let Some(parent) = entry.target.parent() {
                create_dir_all(parent).map_err(|err| DotsError::Filesystem {
                    source: err,
                    op: "create directory",
                    path: parent.to_path_buf(),
                })?;
            }

            remove_existing(&entry.target)?;
            make_link(&entry.source, &entry.target)?;
            info!("link {entry}");
        }

        Ok(entries)
    }

    /// Pull latest changes into source directory.
    ///
    /// # Errors
    ///
    /// - Return [`DotsError::SourceMissing`] if source directory does not
    ///   exist.
    /// - Return [`DotsError::NotAVersionedTree`] if source directory is not
    ///   a repository.
    /// - Return [`DotsError::PullFailed`] if pulling fails.
    #[instrument(skip(self), level = "debug")]
    pub fn refresh(&self) -> Result<()> {
        let config = self.store.load()?;
        let source_dir = absolute_path(&config.dotfiles.dir)?;
        require_versioned(&source_dir)?;

        info!("pull latest changes into {:?}", source_dir.display());
        self.vcs
            .pull(&source_dir)
            .map_err(|err| DotsError::from_vcs(err, |stderr| DotsError::PullFailed { stderr }))
    }

    /// Capture file from home directory into source directory.
    ///
    /// The file is copied to the same relative location inside the source
    /// directory, staged, and committed. Only then is the original replaced by
    /// a link to the copy.
    ///
    /// # Errors
    ///
    /// - Return [`DotsError::SourceMissing`] if source directory does not
    ///   exist.
    /// - Return [`DotsError::NotAVersionedTree`] if source directory is not
    ///   a repository.
    /// - Return [`DotsError::FileMissing`] if `path` does not exist.
    /// - Return [`DotsError::OutsideHome`] if `path` is not inside home
    ///   directory.
    /// - Return [`DotsError::InsideSource`] if `path` is already inside the
    ///   source directory.
    /// - Return [`DotsError::VersionControlFailed`] if staging or committing
    ///   fails. The original file is left untouched.
    /// - Return [`DotsError::Filesystem`] if copying or linking fails.
    #[instrument(skip(self, path), level = "debug")]
    pub fn capture(&self, path: impl AsRef<Path>) -> Result<LinkEntry> {
        let config = self.store.load()?;
        let resolver = PathResolver::new(absolute_path(&config.dotfiles.dir)?, &self.home_dir);
        require_versioned(resolver.source_dir())?;

        let path = path.as_ref();
        if !path.exists() {
            return Err(DotsError::FileMissing {
                path: path.to_path_buf(),
            });
        }

        let original = absolute_path(path)?;
        if is_inside(&original, resolver.source_dir())? {
            return Err(DotsError::InsideSource { path: original });
        }

        let relative = resolver
            .home_relative(&original)
            .ok_or_else(|| DotsError::OutsideHome {
                path: original.clone(),
                home: self.home_dir.clone(),
            })?
            .to_path_buf();

        let captured = resolver.source_location(&relative);
        if let Some(parent) = captured.parent() {
            create_dir_all(parent).map_err(|err| DotsError::Filesystem {
                source: err,
                op: "create directory",
                path: parent.to_path_buf(),
            })?;
        }

        debug!("copy {:?} to {:?}", original.display(), captured.display());
        copy(&original, &captured).map_err(|err| DotsError::Filesystem {
            source: err,
            op: "copy",
            path: original.clone(),
        })?;

        let vcs_failed = |err: VcsError| {
            DotsError::from_vcs(err, |stderr| DotsError::VersionControlFailed { stderr })
        };
        self.vcs.add(resolver.source_dir(), &relative).map_err(vcs_failed)?;
        self.vcs
            .commit(resolver.source_dir(), &format!("Add {}", relative.display()))
            .map_err(vcs_failed)?;

        // INVARIANT: Only touch the original after the copy is committed.
        remove_file(&original).map_err(|err| DotsError::Filesystem {
            source: err,
            op: "remove",
            path: original.clone(),
        })?;
        make_link(&captured, &original)?;

        let entry = LinkEntry {
            source: captured,
            target: original,
        };
        info!("captured {entry}");

        Ok(entry)
    }
}

// INVARIANT: Resolve `..` before any containment check.
fn absolute_path(path: &Path) -> Result<PathBuf> {
    absolute(path)
        .map(normalize)
        .map_err(|err| DotsError::Filesystem {
            source: err,
            op: "resolve",
            path: path.to_path_buf(),
        })
}

// INVARIANT: Follow links, so files that were already captured are caught too.
fn is_inside(path: &Path, dir: &Path) -> Result<bool> {
    if path.starts_with(dir) {
        return Ok(true);
    }

    let canonical = |path: &Path| {
        canonicalize(path).map_err(|err| DotsError::Filesystem {
            source: err,
            op: "resolve",
            path: path.to_path_buf(),
        })
    };

    Ok(canonical(path)?.starts_with(canonical(dir)?))
}

fn require_source(source_dir: &Path) -> Result<()> {
    if !source_dir.is_dir() {
        return Err(DotsError::SourceMissing {
            path: source_dir.to_path_buf(),
        });
    }

    Ok(())
}

fn require_versioned(source_dir: &Path) -> Result<()> {
    require_source(source_dir)?;
    if !source_dir.join(VCS_DIR).exists() {
        return Err(DotsError::NotAVersionedTree {
            path: source_dir.to_path_buf(),
        });
    }

    Ok(())
}

fn remove_existing(path: &Path) -> Result<()> {
    let Ok(metadata) = symlink_metadata(path) else {
        return Ok(());
    };

    debug!("replace existing {:?}", path.display());
    let removed = if metadata.is_dir() {
        remove_dir(path)
    } else {
        remove_file(path)
    };

    removed.map_err(|err| DotsError::Filesystem {
        source: err,
        op: "remove",
        path: path.to_path_buf(),
    })
}

#[cfg(unix)]
fn make_link(source: &Path, target: &Path) -> Result<()> {
    std::os::unix::fs::symlink(source, target).map_err(|err| DotsError::Filesystem {
        source: err,
        op: "link",
        path: target.to_path_buf(),
    })
}

#[cfg(windows)]
fn make_link(source: &Path, target: &Path) -> Result<()> {
    std::os::windows::fs::symlink_file(source, target).map_err(|err| DotsError::Filesystem {
        source: err,
        op: "link",
        path: target.to_path_buf(),
    })
}

/// Dotfile synchronization error types.
#[derive(Debug, thiserror::Error)]
pub enum DotsError {
    /// Source directory does not exist.
    #[error("dotfiles directory not found at {:?}", path.display())]
    SourceMissing { path: PathBuf },

    /// Source directory is not a repository.
    #[error("dotfiles directory at {:?} is not a git repository", path.display())]
    NotAVersionedTree { path: PathBuf },

    /// File to capture does not exist.
    #[error("file not found at {:?}", path.display())]
    FileMissing { path: PathBuf },

    /// File to capture is not inside home directory.
    #[error("file {:?} must be inside home directory {:?}", path.display(), home.display())]
    OutsideHome { path: PathBuf, home: PathBuf },

    /// File to capture already lives in source directory.
    #[error("file {:?} is already inside dotfiles directory", path.display())]
    InsideSource { path: PathBuf },

    /// Remote repository could not be cloned.
    #[error("failed to clone dotfiles repository {url:?}: {stderr}")]
    CloneFailed { url: String, stderr: String },

    /// Empty repository could not be initialized.
    #[error("failed to initialize dotfiles repository: {stderr}")]
    InitFailed { stderr: String },

    /// Latest changes could not be pulled.
    #[error("failed to update dotfiles: {stderr}")]
    PullFailed { stderr: String },

    /// Captured file could not be staged or committed.
    #[error("failed to commit captured file: {stderr}")]
    VersionControlFailed { stderr: String },

    /// Filesystem operation failed.
    #[error("failed to {op} {:?}", path.display())]
    Filesystem {
        #[source]
        source: std::io::Error,
        op: &'static str,
        path: PathBuf,
    },

    /// Source directory could not be traversed.
    #[error(transparent)]
    Walk(#[from] ignore::Error),

    /// Configuration could not be loaded or saved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Git could not be run at all.
    #[error(transparent)]
    Shell(#[from] ShellError),
}

impl DotsError {
    fn from_vcs(err: VcsError, failed: impl FnOnce(String) -> Self) -> Self {
        match err {
            VcsError::CommandFailed { stderr, .. } => failed(stderr),
            VcsError::Shell(err) => Self::Shell(err),
        }
    }
}

/// Friendly result alias :3
pub type Result<T, E = DotsError> = std::result::Result<T, E>;

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::{
        config::{Config, DotfilesSettings, MemoryConfigStore},
        vcs,
    };
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::{
        cell::RefCell,
        fs::{create_dir_all, read_link, read_to_string, write},
    };

    #[derive(Debug, Default)]
    struct FakeVcs {
        calls: RefCell<Vec<String>>,
        fail_on: Option<&'static str>,
    }

    impl FakeVcs {
        fn failing_on(command: &'static str) -> Self {
            Self {
                calls: RefCell::default(),
                fail_on: Some(command),
            }
        }

        fn record(&self, command: &'static str, call: String) -> vcs::Result<()> {
            self.calls.borrow_mut().push(call);
            if self.fail_on == Some(command) {
                return Err(VcsError::CommandFailed {
                    args: command.into(),
                    stderr: format!("fatal: {command} exploded"),
                });
            }

            Ok(())
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl VersionControl for FakeVcs {
        fn clone_repo(&self, url: &str, path: &Path) -> vcs::Result<()> {
            self.record("clone", format!("clone {url}"))?;
            std::fs::create_dir_all(path.join(VCS_DIR)).unwrap();
            std::fs::write(path.join(".bashrc"), "export EDITOR=vim\n").unwrap();
            Ok(())
        }

        fn init(&self, path: &Path) -> vcs::Result<()> {
            self.record("init", "init".into())?;
            std::fs::create_dir_all(path.join(VCS_DIR)).unwrap();
            Ok(())
        }

        fn pull(&self, _path: &Path) -> vcs::Result<()> {
            self.record("pull", "pull".into())
        }

        fn add(&self, _path: &Path, file: &Path) -> vcs::Result<()> {
            self.record("add", format!("add {}", file.display()))
        }

        fn commit(&self, _path: &Path, message: &str) -> vcs::Result<()> {
            self.record("commit", format!("commit {message}"))
        }
    }

    struct Fixture {
        dots: Dotfiles<FakeVcs, MemoryConfigStore>,
        home: PathBuf,
        source: PathBuf,
    }

    impl Fixture {
        fn new(vcs: FakeVcs) -> anyhow::Result<Self> {
            let home = std::env::current_dir()?.join("home");
            let source = home.join(".dotfiles");
            create_dir_all(&home)?;

            let store = MemoryConfigStore::new(Config {
                dotfiles: DotfilesSettings {
                    dir: source.clone(),
                    repo: None,
                },
                ..Default::default()
            });

            Ok(Self {
                dots: Dotfiles::new(vcs, store, &home),
                home,
                source,
            })
        }

        fn with_source_files(self, files: &[(&str, &str)]) -> anyhow::Result<Self> {
            for (name, content) in files {
                let path = self.source.join(name);
                create_dir_all(path.parent().unwrap())?;
                write(path, content)?;
            }

            Ok(self)
        }

        fn versioned(self) -> anyhow::Result<Self> {
            create_dir_all(self.source.join(VCS_DIR))?;
            Ok(self)
        }
    }

    #[sealed_test]
    fn init_without_url_creates_repository() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?;

        fixture.dots.init(None)?;

        assert!(fixture.source.join(VCS_DIR).is_dir());
        assert_eq!(fixture.dots.vcs.calls(), vec!["init".to_string()]);
        assert_eq!(fixture.dots.store.current().dotfiles.repo, None);

        Ok(())
    }

    #[sealed_test]
    fn init_with_url_records_repository() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?;

        fixture.dots.init(Some("https://blah.org/dots.git"))?;

        assert_eq!(
            fixture.dots.vcs.calls(),
            vec!["clone https://blah.org/dots.git".to_string()]
        );
        assert_eq!(
            fixture.dots.store.current().dotfiles.repo,
            Some("https://blah.org/dots.git".into())
        );

        Ok(())
    }

    #[sealed_test]
    fn init_clone_failure_keeps_config() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::failing_on("clone"))?;

        let result = fixture.dots.init(Some("https://blah.org/dots.git"));

        match result {
            Err(DotsError::CloneFailed { url, stderr }) => {
                assert_eq!(url, "https://blah.org/dots.git");
                assert_eq!(stderr, "fatal: clone exploded");
            }
            other => panic!("expected clone failure, got {other:?}"),
        }
        assert_eq!(fixture.dots.store.current().dotfiles.repo, None);

        Ok(())
    }

    #[sealed_test]
    fn init_failure_reports_init_failed() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::failing_on("init"))?;

        let result = fixture.dots.init(None);

        assert!(matches!(result, Err(DotsError::InitFailed { .. })));
        assert!(fixture.source.is_dir());

        Ok(())
    }

    #[sealed_test]
    fn apply_follows_eligibility_rules() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?.with_source_files(&[
            ("README.md", "# dots"),
            (".bashrc", "export EDITOR=vim"),
            ("sub/config", "key = value"),
            (".git/config", "[core]"),
            (".git/.hidden", "nope"),
        ])?;

        let result = fixture.dots.apply()?;
        let expect = vec![
            LinkEntry {
                source: fixture.source.join(".bashrc"),
                target: fixture.home.join(".bashrc"),
            },
            LinkEntry {
                source: fixture.source.join("sub/config"),
                target: fixture.home.join("sub/config"),
            },
        ];
        assert_eq!(result, expect);

        assert_eq!(read_link(fixture.home.join(".bashrc"))?, fixture.source.join(".bashrc"));
        assert_eq!(
            read_link(fixture.home.join("sub/config"))?,
            fixture.source.join("sub/config")
        );
        assert!(symlink_metadata(fixture.home.join("README.md")).is_err());
        assert!(symlink_metadata(fixture.home.join("config")).is_err());
        assert!(symlink_metadata(fixture.home.join(".hidden")).is_err());
        assert!(symlink_metadata(fixture.home.join(".git")).is_err());

        Ok(())
    }

    #[sealed_test]
    fn apply_is_idempotent() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?.with_source_files(&[
            (".bashrc", "export EDITOR=vim"),
            (".config/nvim/init.lua", "vim.o.number = true"),
        ])?;

        let first = fixture.dots.apply()?;
        let first_links = first
            .iter()
            .map(|entry| read_link(&entry.target))
            .collect::<std::io::Result<Vec<_>>>()?;

        let second = fixture.dots.apply()?;
        let second_links = second
            .iter()
            .map(|entry| read_link(&entry.target))
            .collect::<std::io::Result<Vec<_>>>()?;

        assert_eq!(first, second);
        assert_eq!(first_links, second_links);

        Ok(())
    }

    #[sealed_test]
    fn apply_replaces_existing_files() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?
            .with_source_files(&[(".bashrc", "export EDITOR=vim")])?;
        write(fixture.home.join(".bashrc"), "export EDITOR=nano")?;

        fixture.dots.apply()?;

        assert_eq!(read_link(fixture.home.join(".bashrc"))?, fixture.source.join(".bashrc"));
        assert_eq!(read_to_string(fixture.home.join(".bashrc"))?, "export EDITOR=vim");

        Ok(())
    }

    #[sealed_test]
    fn apply_replaces_stale_links() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?
            .with_source_files(&[(".bashrc", "export EDITOR=vim")])?;
        std::os::unix::fs::symlink(fixture.home.join("gone"), fixture.home.join(".bashrc"))?;

        fixture.dots.apply()?;

        assert_eq!(read_link(fixture.home.join(".bashrc"))?, fixture.source.join(".bashrc"));

        Ok(())
    }

    #[sealed_test]
    fn apply_aborts_on_first_failure() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?.with_source_files(&[
            (".bashrc", "export EDITOR=vim"),
            ("sub/config", "key = value"),
            ("sub/zed", "theme = dark"),
        ])?;
        create_dir_all(fixture.home.join("sub/config/x"))?;

        let result = fixture.dots.apply();

        match result {
            Err(DotsError::Filesystem { op, path, .. }) => {
                assert_eq!(op, "remove");
                assert_eq!(path, fixture.home.join("sub/config"));
            }
            other => panic!("expected filesystem failure, got {other:?}"),
        }
        assert_eq!(read_link(fixture.home.join(".bashrc"))?, fixture.source.join(".bashrc"));
        assert!(fixture.home.join("sub/config/x").is_dir());
        assert!(symlink_metadata(fixture.home.join("sub/zed")).is_err());

        Ok(())
    }

    #[sealed_test]
    fn apply_without_source_fails() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?;

        let result = fixture.dots.apply();

        assert!(matches!(result, Err(DotsError::SourceMissing { .. })));

        Ok(())
    }

    #[sealed_test]
    fn plan_does_not_touch_home() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?
            .with_source_files(&[(".bashrc", "export EDITOR=vim"), ("sub/config", "")])?;

        let result = fixture.dots.plan()?;

        assert_eq!(result.len(), 2);
        assert!(symlink_metadata(fixture.home.join(".bashrc")).is_err());
        assert!(!fixture.home.join("sub").exists());

        Ok(())
    }

    #[sealed_test]
    fn refresh_pulls_into_source() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?.versioned()?;

        fixture.dots.refresh()?;

        assert_eq!(fixture.dots.vcs.calls(), vec!["pull".to_string()]);

        Ok(())
    }

    #[sealed_test]
    fn refresh_reports_pull_failure() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::failing_on("pull"))?.versioned()?;

        let result = fixture.dots.refresh();

        match result {
            Err(DotsError::PullFailed { stderr }) => assert_eq!(stderr, "fatal: pull exploded"),
            other => panic!("expected pull failure, got {other:?}"),
        }

        Ok(())
    }

    #[sealed_test]
    fn refresh_requires_versioned_source() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?.with_source_files(&[(".bashrc", "")])?;

        let result = fixture.dots.refresh();

        assert!(matches!(result, Err(DotsError::NotAVersionedTree { .. })));
        assert!(fixture.dots.vcs.calls().is_empty());

        Ok(())
    }

    #[sealed_test]
    fn refresh_requires_source() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?;

        let result = fixture.dots.refresh();

        assert!(matches!(result, Err(DotsError::SourceMissing { .. })));

        Ok(())
    }

    #[sealed_test]
    fn capture_then_apply_round_trip() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?.versioned()?;
        let original = fixture.home.join(".config/foo/foo.toml");
        create_dir_all(original.parent().unwrap())?;
        write(&original, "answer = 42\n")?;

        let entry = fixture.dots.capture(&original)?;

        let captured = fixture.source.join(".config/foo/foo.toml");
        assert_eq!(
            entry,
            LinkEntry {
                source: captured.clone(),
                target: original.clone(),
            }
        );
        assert_eq!(read_to_string(&captured)?, "answer = 42\n");
        assert_eq!(read_link(&original)?, captured);
        assert_eq!(
            fixture.dots.vcs.calls(),
            vec![
                "add .config/foo/foo.toml".to_string(),
                "commit Add .config/foo/foo.toml".into(),
            ]
        );

        fixture.dots.apply()?;
        assert_eq!(read_link(&original)?, captured);
        assert_eq!(read_to_string(&original)?, "answer = 42\n");

        Ok(())
    }

    #[sealed_test]
    fn capture_accepts_relative_path() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?.versioned()?;
        write(fixture.home.join(".vimrc"), "set number")?;

        let entry = fixture.dots.capture("home/.vimrc")?;

        assert_eq!(entry.target, fixture.home.join(".vimrc"));
        assert_eq!(entry.source, fixture.source.join(".vimrc"));

        Ok(())
    }

    #[sealed_test]
    fn capture_commit_failure_leaves_original_intact() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::failing_on("commit"))?.versioned()?;
        let original = fixture.home.join(".vimrc");
        write(&original, "set number")?;

        let result = fixture.dots.capture(&original);

        assert!(matches!(result, Err(DotsError::VersionControlFailed { .. })));
        assert!(!symlink_metadata(&original)?.file_type().is_symlink());
        assert_eq!(read_to_string(&original)?, "set number");

        Ok(())
    }

    #[sealed_test]
    fn capture_stage_failure_skips_commit() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::failing_on("add"))?.versioned()?;
        let original = fixture.home.join(".vimrc");
        write(&original, "set number")?;

        let result = fixture.dots.capture(&original);

        assert!(matches!(result, Err(DotsError::VersionControlFailed { .. })));
        assert_eq!(fixture.dots.vcs.calls(), vec!["add .vimrc".to_string()]);
        assert!(!symlink_metadata(&original)?.file_type().is_symlink());

        Ok(())
    }

    #[sealed_test]
    fn capture_requires_versioned_source() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?.with_source_files(&[("README.md", "")])?;
        let original = fixture.home.join(".vimrc");
        write(&original, "set number")?;

        let result = fixture.dots.capture(&original);

        assert!(matches!(result, Err(DotsError::NotAVersionedTree { .. })));
        assert!(!fixture.source.join(".vimrc").exists());
        assert!(!symlink_metadata(&original)?.file_type().is_symlink());
        assert!(fixture.dots.vcs.calls().is_empty());

        Ok(())
    }

    #[sealed_test]
    fn capture_rejects_files_outside_home() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?.versioned()?;
        let outside = std::env::current_dir()?.join("elsewhere.txt");
        write(&outside, "hello")?;

        let result = fixture.dots.capture(&outside);

        assert!(matches!(result, Err(DotsError::OutsideHome { .. })));
        assert_eq!(read_to_string(&outside)?, "hello");

        Ok(())
    }

    #[sealed_test]
    fn capture_rejects_parent_escape() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?.versioned()?;
        let outside = std::env::current_dir()?.join("outside.txt");
        write(&outside, "hello")?;

        let result = fixture.dots.capture(fixture.home.join("../outside.txt"));

        assert!(matches!(result, Err(DotsError::OutsideHome { .. })));
        assert!(!symlink_metadata(&outside)?.file_type().is_symlink());
        assert_eq!(read_to_string(&outside)?, "hello");
        assert!(!fixture.home.join("outside.txt").exists());
        assert!(fixture.dots.vcs.calls().is_empty());

        Ok(())
    }

    #[sealed_test]
    fn capture_resolves_parent_inside_home() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?.versioned()?;
        create_dir_all(fixture.home.join("sub"))?;
        write(fixture.home.join(".vimrc"), "set number")?;

        let entry = fixture.dots.capture(fixture.home.join("sub/../.vimrc"))?;

        assert_eq!(
            entry,
            LinkEntry {
                source: fixture.source.join(".vimrc"),
                target: fixture.home.join(".vimrc"),
            }
        );
        assert!(!fixture.source.join("sub").exists());
        assert_eq!(
            fixture.dots.vcs.calls(),
            vec!["add .vimrc".to_string(), "commit Add .vimrc".into()]
        );

        Ok(())
    }

    #[sealed_test]
    fn capture_rejects_already_captured_file() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?.versioned()?;
        let original = fixture.home.join(".vimrc");
        write(&original, "set number")?;
        fixture.dots.capture(&original)?;

        let result = fixture.dots.capture(&original);

        assert!(matches!(result, Err(DotsError::InsideSource { .. })));
        assert_eq!(read_to_string(&original)?, "set number");

        Ok(())
    }

    #[sealed_test]
    fn capture_rejects_missing_file() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?.versioned()?;

        let result = fixture.dots.capture(fixture.home.join(".nope"));

        assert!(matches!(result, Err(DotsError::FileMissing { .. })));

        Ok(())
    }

    #[sealed_test]
    fn capture_rejects_files_inside_source() -> anyhow::Result<()> {
        let fixture = Fixture::new(FakeVcs::default())?
            .versioned()?
            .with_source_files(&[(".bashrc", "export EDITOR=vim")])?;

        let result = fixture.dots.capture(fixture.source.join(".bashrc"));

        assert!(matches!(result, Err(DotsError::InsideSource { .. })));
        assert_eq!(read_to_string(fixture.source.join(".bashrc"))?, "export EDITOR=vim");

        Ok(())
    }
}
