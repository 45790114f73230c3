//! Persistent record of applied column patches.

use crate::{
    entities::{PatchHistory, patch_history},
    errors::Result,
    schema::{identifier::Identifier, introspect::table_exists},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, EntityName, EntityTrait, QueryOrder, Schema, Set,
};
use tracing::{debug, instrument};

/// Creates `schema_patch_history` from the entity definition if it is absent.
#[instrument(skip(db))]
pub async fn ensure_history_table<C: ConnectionTrait>(db: &C) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);
    let mut table = schema.create_table_from_entity(PatchHistory);
    table.if_not_exists();
    db.execute(builder.build(&table)).await?;
    debug!("Patch history table ensured");
    Ok(())
}

/// Inserts one history row. Called with the per-column transaction so the
/// row commits or rolls back together with the schema change.
pub async fn record_patch<C: ConnectionTrait>(
    conn: &C,
    table: &Identifier,
    column: &Identifier,
    statement: &str,
) -> Result<patch_history::Model> {
    patch_history::ActiveModel {
        table_name: Set(table.to_string()),
        column_name: Set(column.to_string()),
        statement: Set(statement.to_string()),
        applied_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

/// All recorded patches, oldest first. Empty when history was never enabled.
#[instrument(skip(db))]
pub async fn list_patches<C: ConnectionTrait>(db: &C) -> Result<Vec<patch_history::Model>> {
    let table = Identifier::parse(PatchHistory.table_name())?;
    if !table_exists(db, &table).await? {
        return Ok(Vec::new());
    }

    PatchHistory::find()
        .order_by_asc(patch_history::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
