//! Patch history entity - One row per column added by the reconciler.
//!
//! Written inside the same transaction as the `ALTER TABLE`, so a recorded
//! patch always corresponds to a committed schema change.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Applied schema patch
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "schema_patch_history")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Table the column was added to
    pub table_name: String,
    /// Name of the added column
    pub column_name: String,
    /// The `ALTER TABLE` statement that was executed
    pub statement: String,
    /// When the patch was committed
    pub applied_at: DateTimeUtc,
}

/// `PatchHistory` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
