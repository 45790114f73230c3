//! Command-line interface definition.

use crate::config::settings::Overrides;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Top-level command line.
#[derive(Debug, Parser)]
#[command(name = "cater-schema", version)]
#[command(about = "Bring catering ERP SQLite databases up to the expected schema")]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// Database file to process (repeatable; defaults to DATABASE_URL or instance/catering.db)
    #[arg(long = "db", value_name = "PATH", global = true)]
    pub databases: Vec<PathBuf>,

    /// Expected-schema manifest (defaults to CATER_SCHEMA_MANIFEST or the built-in catalog)
    #[arg(long, value_name = "PATH", global = true)]
    pub manifest: Option<PathBuf>,

    /// Only process this table (repeatable)
    #[arg(long = "table", value_name = "NAME", global = true)]
    pub tables: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    /// Record added columns in schema_patch_history
    #[arg(long, global = true)]
    pub record_history: bool,

    /// Create database files that do not exist yet
    #[arg(long, global = true)]
    pub create_missing_db: bool,
}

/// Available subcommands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Report missing columns and tables without changing anything
    Check,
    /// Add missing columns (and tables marked create_if_missing)
    Apply,
    /// List the live tables and columns of each database
    Inspect,
    /// Show columns previously added with --record-history
    History,
}

/// Output format of every subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Line-oriented, human-readable
    Text,
    /// Pretty-printed JSON array, one element per database
    Json,
}

impl Cli {
    /// Flag values that take precedence over environment and defaults.
    #[must_use]
    pub fn overrides(&self) -> Overrides {
        Overrides {
            databases: self.databases.clone(),
            manifest: self.manifest.clone(),
            tables: self.tables.clone(),
            record_history: self.record_history,
            create_missing_db: self.create_missing_db,
        }
    }
}
