// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use devenv::{
    path::{default_config_path, home_dir},
    Dotfiles, GitCli, Repos, TomlConfigStore,
};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "devenv [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, env = "DEVENV_CONFIG", value_name = "path")]
    pub config: Option<PathBuf>,

    /// Log debug output, unless `RUST_LOG` says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => default_config_path()?,
        };
        let store = TomlConfigStore::new(config_path);

        match self.command {
            Command::Dots(opts) => {
                let dots = Dotfiles::new(GitCli::default(), store, home_dir()?);
                run_dots(&dots, opts.command)
            }
            Command::Repo(opts) => run_repo(&Repos::new(GitCli::default(), store), opts.command),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Manage dotfiles.
    #[command(override_usage = "devenv dots <command>")]
    Dots(DotsOptions),

    /// Manage tracked repositories.
    #[command(override_usage = "devenv repo <command>")]
    Repo(RepoOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DotsOptions {
    #[command(subcommand)]
    pub command: DotsCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum DotsCommand {
    /// Initialize dotfiles from a repository, or create a new one.
    #[command(override_usage = "devenv dots init [url]")]
    Init(InitOptions),

    /// Link dotfiles into home directory.
    #[command(override_usage = "devenv dots apply")]
    Apply,

    /// Pull latest dotfiles from repository.
    #[command(override_usage = "devenv dots update")]
    Update,

    /// Add file from home directory to dotfiles.
    #[command(override_usage = "devenv dots add <path>")]
    Add(AddOptions),

    /// List links that apply would create.
    #[command(override_usage = "devenv dots list")]
    List,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InitOptions {
    /// URL of remote to clone dotfiles from.
    #[arg(value_name = "url")]
    pub url: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AddOptions {
    /// Path of file to add.
    #[arg(required = true, value_name = "path")]
    pub path: PathBuf,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RepoOptions {
    #[command(subcommand)]
    pub command: RepoCommand,
}

#[derive(Debug, Clone, Subcommand)]
enum RepoCommand {
    /// Clone repository and track it.
    #[command(override_usage = "devenv repo clone <url>")]
    Clone(CloneOptions),

    /// Pull latest changes into one or all tracked repositories.
    #[command(override_usage = "devenv repo update [name]")]
    Update(NameOptions),

    /// List tracked repositories.
    #[command(override_usage = "devenv repo list")]
    List,

    /// Stop tracking repository, but keep its files.
    #[command(override_usage = "devenv repo remove <name>")]
    Remove(RequiredNameOptions),

    /// Stop tracking repository, and delete its files.
    #[command(override_usage = "devenv repo delete <name>")]
    Delete(RequiredNameOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CloneOptions {
    /// URL of repository to clone.
    #[arg(required = true, value_name = "url")]
    pub url: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct NameOptions {
    /// Name of tracked repository.
    #[arg(value_name = "name")]
    pub name: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RequiredNameOptions {
    /// Name of tracked repository.
    #[arg(required = true, value_name = "name")]
    pub name: String,
}

fn main() {
    let cli = Cli::parse();

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run_dots(dots: &Dotfiles, command: DotsCommand) -> Result<()> {
    match command {
        DotsCommand::Init(opts) => dots.init(opts.url.as_deref())?,
        DotsCommand::Apply => {
            for entry in dots.apply()? {
                println!("Linked {entry}");
            }
        }
        DotsCommand::Update => dots.refresh()?,
        DotsCommand::Add(opts) => {
            let entry = dots.capture(&opts.path)?;
            println!("Added {} to dotfiles", entry.source.display());
        }
        DotsCommand::List => {
            for entry in dots.plan()? {
                println!("{entry}");
            }
        }
    }

    Ok(())
}

fn run_repo(repos: &Repos, command: RepoCommand) -> Result<()> {
    match command {
        RepoCommand::Clone(opts) => {
            let (name, repo) = repos.clone_repo(&opts.url)?;
            println!("Tracking {name} at {}", repo.path.display());
        }
        RepoCommand::Update(NameOptions { name: Some(name) }) => {
            repos.update(&name)?;
        }
        RepoCommand::Update(NameOptions { name: None }) => {
            let failures = repos.update_all()?;
            if !failures.is_empty() {
                let names = failures
                    .iter()
                    .map(|failure| failure.name.as_str())
                    .collect::<Vec<_>>();
                bail!("failed to update {}", names.join(", "));
            }
        }
        RepoCommand::List => {
            for (name, repo) in repos.list()? {
                println!(
                    "{name}\t{}\t{}\t{}",
                    repo.url,
                    repo.path.display(),
                    repo.last_updated.to_rfc3339()
                );
            }
        }
        RepoCommand::Remove(opts) => {
            repos.remove(&opts.name)?;
            println!("Stopped tracking {}", opts.name);
        }
        RepoCommand::Delete(opts) => {
            let repo = repos.delete(&opts.name)?;
            println!("Deleted {} at {}", opts.name, repo.path.display());
        }
    }

    Ok(())
}
