//! Database connection handling for the reconciler.
//!
//! Databases are addressed by file path. An absent file almost always means a
//! wrong path rather than an empty database, so [`connect`] refuses to create
//! one unless asked to.

use crate::errors::{Error, Result};
use sea_orm::sqlx::ConnectOptions as _;
use sea_orm::sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sea_orm::{DatabaseConnection, DbErr, RuntimeErr, SqlxSqliteConnector};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Default database file used when neither a flag nor `DATABASE_URL` names one.
pub const DEFAULT_DATABASE_PATH: &str = "instance/catering.db";

/// Extracts a file path from `DATABASE_URL`-style values.
///
/// Accepts `sqlite://path`, `sqlite:path` and plain paths; a query string
/// (`?mode=rwc`) is dropped.
#[must_use]
pub fn database_path_from_url(url: &str) -> PathBuf {
    let without_scheme = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let without_query = without_scheme
        .split_once('?')
        .map_or(without_scheme, |(path, _)| path);
    PathBuf::from(without_query)
}

/// Connection options for a database file.
///
/// The path is handed to SQLite as a filename, never parsed as a URL, so
/// names containing `?`, `#` or `%` open exactly that file.
#[must_use]
pub fn connect_options(path: &Path, create: bool) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create)
        .foreign_keys(true)
        .disable_statement_logging()
}

/// Opens the database file at `path`.
///
/// # Arguments
/// * `path` - Database file
/// * `create` - Create the file when it does not exist
///
/// # Errors
/// Returns `Error::DatabaseNotFound` when the file is absent and `create` is
/// false, or `Error::Database` when the connection itself fails.
#[instrument]
pub async fn connect(path: &Path, create: bool) -> Result<DatabaseConnection> {
    if !create && !path.exists() {
        return Err(Error::DatabaseNotFound {
            path: path.display().to_string(),
        });
    }

    debug!("Connecting to {} (create: {})", path.display(), create);
    // One connection keeps foreign_keys in force for every statement.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(path, create))
        .await
        .map_err(|e| DbErr::Conn(RuntimeErr::SqlxError(e)))?;
    info!("Opened database {}", path.display());
    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}
