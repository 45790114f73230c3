//! Shared test utilities for `cater-schema`.
//!
//! Provides an in-memory database with a deliberately outdated schema and the
//! manifest it is expected to drift from.

use crate::errors::Result;
use crate::schema::identifier::Identifier;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use tracing_subscriber::EnvFilter;

/// Manifest describing the schema the legacy database should converge to.
pub const LEGACY_MANIFEST: &str = r#"
[[tables]]
name = "events"

[[tables.columns]]
name = "id"
type = "INTEGER"

[[tables.columns]]
name = "name"
type = "TEXT"

[[tables.columns]]
name = "event_date"
type = "DATE"

[[tables.columns]]
name = "guest_count"
type = "INTEGER"
default = 0
not_null = true

[[tables.columns]]
name = "venue"
type = "TEXT"

[[tables.columns]]
name = "status"
type = "VARCHAR(20)"
default = "draft"

[[tables.columns]]
name = "updated_at"
type = "DATETIME"
default = "CURRENT_TIMESTAMP"

[[tables]]
name = "users"
columns = [
    { name = "id", type = "INTEGER" },
    { name = "username", type = "TEXT" },
    { name = "email", type = "VARCHAR(120)" },
    { name = "is_active", type = "BOOLEAN", default = true, not_null = true },
    { name = "role", type = "TEXT", default = "staff" },
]

[[tables]]
name = "incidents"
create_if_missing = true
columns = [
    { name = "title", type = "TEXT", default = "", not_null = true },
    { name = "severity", type = "INTEGER", default = 1 },
    { name = "reported_at", type = "DATETIME", default = "CURRENT_TIMESTAMP" },
]
"#;

/// Installs a test-writer subscriber once; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database holding an old version of the
/// events and users tables, with one row each.
pub async fn setup_legacy_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    db.execute_unprepared(
        "CREATE TABLE events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            event_date DATE
        );
        CREATE TABLE users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL
        );
        INSERT INTO events (name, event_date) VALUES ('Harbour gala', '2026-05-01');
        INSERT INTO users (username) VALUES ('chef');",
    )
    .await?;
    Ok(db)
}

/// Test shorthand for a known-valid identifier.
#[allow(clippy::unwrap_used)]
pub fn ident(name: &str) -> Identifier {
    Identifier::parse(name).unwrap()
}
