//! Command line definition.
//!
//! Every global flag can also be set through a `TESSERA__*` environment
//! variable. Precedence, highest first: flag, environment, config file,
//! built-in default.

use std::{path::PathBuf, time::Duration};

use clap::{Parser, Subcommand};
use tessera_types::{Config, ConfigError, Id, LogFormat};

/// Tessera store administration.
#[derive(Debug, Parser)]
#[command(name = "tessera", version, about)]
pub struct Cli {
    /// TOML config file.
    #[arg(long, short = 'c', env = "TESSERA__CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Database file. Overrides `storage.path`.
    #[arg(long, env = "TESSERA__STORAGE__PATH", global = true)]
    pub data: Option<PathBuf>,

    /// Log output format: auto, text or json.
    #[arg(long, env = "TESSERA__LOGGING__FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Default log filter directive, used when `RUST_LOG` is unset.
    #[arg(long, env = "TESSERA__LOGGING__FILTER", global = true)]
    pub log_filter: Option<String>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Inspect or run schema migrations.
    Migration {
        /// Migration action.
        #[command(subcommand)]
        action: MigrationAction,
    },
    /// Inspect buckets.
    Buckets {
        /// Bucket action.
        #[command(subcommand)]
        action: BucketsAction,
    },
    /// Print configuration documentation.
    Config {
        /// Config action.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Migration subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum MigrationAction {
    /// Show the migration flag of every resource type.
    Status,
    /// Convert legacy records if the dataset is not migrated yet.
    Run {
        /// Deadline for the conversion. Overrides `migration.timeout`.
        #[arg(long, value_parser = humantime::parse_duration)]
        timeout: Option<Duration>,
    },
}

/// Bucket subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum BucketsAction {
    /// Print matching buckets, one JSON object per line.
    List {
        /// Owning organization id (16 hex digits).
        #[arg(long)]
        org_id: Option<Id>,
        /// Owning organization name.
        #[arg(long)]
        org: Option<String>,
        /// Bucket name.
        #[arg(long)]
        name: Option<String>,
    },
}

/// Config subcommands.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Print the JSON Schema of the config file.
    Schema,
    /// Print a config file with every default.
    Example,
}

impl Cli {
    /// Builds the effective configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the config file cannot be loaded or the
    /// merged result fails validation.
    pub fn resolve_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(path) = &self.data {
            config.storage.path = Some(path.clone());
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(filter) = &self.log_filter {
            config.logging.filter = filter.clone();
        }
        if let Command::Migration { action: MigrationAction::Run { timeout: Some(timeout) } } =
            &self.command
        {
            config.migration.timeout = *timeout;
        }

        config.validate()?;
        Ok(config)
    }
}
