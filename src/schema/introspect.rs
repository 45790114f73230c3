//! Live schema introspection through `sqlite_master` and `PRAGMA table_info`.

use crate::errors::{Error, Result};
use crate::schema::identifier::{Identifier, quote_name};
use sea_orm::{ConnectionTrait, Statement};
use serde::Serialize;
use tracing::{debug, instrument};

/// One row of `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveColumn {
    /// Position in the table, starting at 0
    pub cid: i64,
    /// Column name as stored by SQLite
    pub name: String,
    /// Declared type text; empty for untyped columns
    pub decl_type: String,
    /// Column carries a NOT NULL constraint
    pub not_null: bool,
    /// Default expression as SQL text
    pub default: Option<String>,
    /// Column is part of the primary key
    pub primary_key: bool,
}

/// User tables of the database, sorted by name. SQLite internals are skipped.
#[instrument(skip(db))]
pub async fn list_tables<C: ConnectionTrait>(db: &C) -> Result<Vec<String>> {
    let rows = db
        .query_all(Statement::from_string(
            db.get_database_backend(),
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
             ORDER BY name",
        ))
        .await?;

    rows.iter()
        .map(|row| row.try_get::<String>("", "name").map_err(Error::from))
        .collect()
}

/// Whether `table` exists, compared case-insensitively like SQLite does.
#[instrument(skip(db))]
pub async fn table_exists<C: ConnectionTrait>(db: &C, table: &Identifier) -> Result<bool> {
    let row = db
        .query_one(Statement::from_sql_and_values(
            db.get_database_backend(),
            "SELECT 1 AS present FROM sqlite_master \
             WHERE type = 'table' AND name = ? COLLATE NOCASE LIMIT 1",
            [table.as_str().into()],
        ))
        .await?;
    Ok(row.is_some())
}

/// Live columns of `table` in declaration order. Empty when the table is absent.
#[instrument(skip(db))]
pub async fn table_columns<C: ConnectionTrait>(
    db: &C,
    table: &Identifier,
) -> Result<Vec<LiveColumn>> {
    columns_of(db, table.as_str()).await
}

/// Like [`table_columns`], for any table name read back from `sqlite_master`.
pub async fn columns_of<C: ConnectionTrait>(db: &C, table: &str) -> Result<Vec<LiveColumn>> {
    let rows = db
        .query_all(Statement::from_string(
            db.get_database_backend(),
            format!("PRAGMA table_info({})", quote_name(table)),
        ))
        .await?;

    let columns = rows
        .iter()
        .map(|row| -> Result<LiveColumn> {
            Ok(LiveColumn {
                cid: row.try_get("", "cid")?,
                name: row.try_get("", "name")?,
                decl_type: row.try_get("", "type")?,
                not_null: row.try_get::<i64>("", "notnull")? != 0,
                default: row.try_get("", "dflt_value")?,
                primary_key: row.try_get::<i64>("", "pk")? != 0,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("Table {} has {} live columns", table, columns.len());
    Ok(columns)
}
