//! Command-line interface for ddl
//!
//! This module defines the CLI structure using clap derive macros.
//! Each group of subcommands lives in its own submodule.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, Utc};
use clap::{Parser, Subcommand};

use crate::config::{Config, Secrets, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::output::OutputOptions;
use crate::task::parse_due;
use crate::zone::Zone;

mod run;
mod task;
mod view;

/// ddl - daily deadline digest
///
/// Collects upcoming deadlines from PrairieLearn and configured schedules,
/// keeps them in a local registry with completion flags, and mails a digest
/// of what is still pending.
#[derive(Parser, Debug)]
#[command(name = "ddl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, env = "DDL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Registry file (overrides `registry` from the config)
    #[arg(long, global = true)]
    pub registry: Option<PathBuf>,

    /// Reference time as RFC 3339 (defaults to the system clock)
    #[arg(long, global = true)]
    pub now: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// PrairieLearn API token
    #[arg(long, global = true, env = "PL_TOKEN", hide = true, hide_env_values = true)]
    pub pl_token: Option<String>,

    /// SMTP login
    #[arg(long, global = true, env = "SMTP_USERNAME", hide = true, hide_env_values = true)]
    pub smtp_username: Option<String>,

    /// SMTP password or app password
    #[arg(long, global = true, env = "SMTP_PASSWORD", hide = true, hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Digest recipient
    #[arg(long, global = true, env = "DIGEST_TO", hide = true, hide_env_values = true)]
    pub digest_to: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync every source, update the registry and mail the digest
    Run {
        /// Build the digest but do not send it
        #[arg(long)]
        dry_run: bool,
    },

    /// Sync every source into the registry without sending anything
    Sync,

    /// Print the digest for the current registry
    Digest {
        /// Print the HTML body instead of plain text
        #[arg(long)]
        html: bool,
    },

    /// List every task in the registry
    List,

    /// Mark a task as completed
    Complete {
        /// Task id
        id: String,
    },

    /// Mark a completed task as pending again
    Reopen {
        /// Task id
        id: String,
    },

    /// Print the id a title and due date map to
    Id {
        /// Assignment title
        title: String,

        /// Due timestamp (RFC 3339)
        due: String,
    },
}

/// Configuration, clock and output mode shared by every command.
pub(crate) struct Context {
    pub config: Config,
    pub now: DateTime<FixedOffset>,
    pub output: OutputOptions,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let Cli {
            config,
            registry,
            now,
            json,
            quiet,
            pl_token,
            smtp_username,
            smtp_password,
            digest_to,
            command,
        } = self;

        let output = OutputOptions { json, quiet };
        let secrets = Secrets {
            pl_token,
            smtp_username,
            smtp_password,
            recipient: digest_to,
        };
        let context = move || load_context(config, registry, now.as_deref(), output);

        match command {
            Commands::Run { dry_run } => run::run_digest(run::RunOptions {
                context: context()?,
                secrets,
                dry_run,
            }),
            Commands::Sync => run::run_sync(run::SyncOptions {
                context: context()?,
                secrets,
            }),
            Commands::Digest { html } => view::run_digest(view::DigestOptions {
                context: context()?,
                html,
            }),
            Commands::List => view::run_list(view::ListOptions {
                context: context()?,
            }),
            Commands::Complete { id } => task::run_set_completed(task::CompletedOptions {
                context: context()?,
                id,
                completed: true,
            }),
            Commands::Reopen { id } => task::run_set_completed(task::CompletedOptions {
                context: context()?,
                id,
                completed: false,
            }),
            // Pure; never reads a config.
            Commands::Id { title, due } => task::run_id(task::IdOptions { title, due, output }),
        }
    }
}

fn load_context(
    config_path: Option<PathBuf>,
    registry: Option<PathBuf>,
    now: Option<&str>,
    output: OutputOptions,
) -> Result<Context> {
    let mut config = match config_path {
        Some(path) if !path.exists() => {
            return Err(Error::InvalidConfig(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Some(path) => Config::load(&path)?,
        None => Config::load_or_default(&PathBuf::from(CONFIG_FILE))?,
    };
    if let Some(registry) = registry {
        config.registry = registry;
    }

    let now = resolve_now(now, config.zone()?)?;
    Ok(Context {
        config,
        now,
        output,
    })
}

/// `--now` if given, otherwise the system clock; either way in `zone`.
fn resolve_now(raw: Option<&str>, zone: Zone) -> Result<DateTime<FixedOffset>> {
    match raw {
        Some(raw) => Ok(zone.localize(&parse_due(raw)?)),
        None => Ok(zone.localize(&Utc::now())),
    }
}
