//! Run settings resolved from command-line overrides, the environment and defaults.
//!
//! Precedence is: explicit flags, then environment variables (a `.env` file is
//! loaded into the environment by the binary), then built-in defaults.

use crate::catalog;
use crate::config::database::{DEFAULT_DATABASE_PATH, database_path_from_url};
use crate::config::manifest::{Manifest, load_manifest};
use crate::errors::{Error, Result};
use std::path::PathBuf;

/// Database URL or path used when no `--db` flag is given.
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
/// Manifest path used when no `--manifest` flag is given.
pub const MANIFEST_VAR: &str = "CATER_SCHEMA_MANIFEST";
/// Boolean enabling patch history without `--record-history`.
pub const HISTORY_VAR: &str = "CATER_SCHEMA_HISTORY";

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// `--db` values
    pub databases: Vec<PathBuf>,
    /// `--manifest` value
    pub manifest: Option<PathBuf>,
    /// `--table` values
    pub tables: Vec<String>,
    /// `--record-history` was given
    pub record_history: bool,
    /// `--create-missing-db` was given
    pub create_missing_db: bool,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Database files, processed independently in this order.
    pub databases: Vec<PathBuf>,
    /// `None` selects the built-in catering ERP catalog.
    pub manifest_path: Option<PathBuf>,
    /// Table filter; empty selects every manifest table
    pub tables: Vec<String>,
    /// Write `schema_patch_history` rows for added columns
    pub record_history: bool,
    /// Create absent database files instead of reporting them
    pub create_missing_db: bool,
}

impl Settings {
    /// Resolves settings, reading environment values through `lookup`.
    pub fn resolve<F>(overrides: Overrides, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let databases = if overrides.databases.is_empty() {
            vec![lookup(DATABASE_URL_VAR).map_or_else(
                || PathBuf::from(DEFAULT_DATABASE_PATH),
                |url| database_path_from_url(&url),
            )]
        } else {
            overrides.databases
        };

        let manifest_path = overrides
            .manifest
            .or_else(|| lookup(MANIFEST_VAR).map(PathBuf::from));

        let record_history = if overrides.record_history {
            true
        } else {
            lookup(HISTORY_VAR)
                .map(|raw| parse_flag(HISTORY_VAR, &raw))
                .transpose()?
                .unwrap_or(false)
        };

        Ok(Self {
            databases,
            manifest_path,
            tables: overrides.tables,
            record_history,
            create_missing_db: overrides.create_missing_db,
        })
    }

    /// Resolves settings against the process environment.
    pub fn from_env(overrides: Overrides) -> Result<Self> {
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Loads the manifest file, or the built-in catalog when none is configured.
    pub fn manifest(&self) -> Result<Manifest> {
        match &self.manifest_path {
            Some(path) => load_manifest(path),
            None => catalog::catering_erp_manifest(),
        }
    }
}

fn parse_flag(var: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Config {
            message: format!("{var} must be a boolean, got {other:?}"),
        }),
    }
}
