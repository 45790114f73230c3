//! Difference between the expected manifest and the live schema.

use crate::config::manifest::Manifest;
use crate::errors::Result;
use crate::schema::column::Affinity;
use crate::schema::identifier::Identifier;
use crate::schema::introspect::{LiveColumn, table_columns, table_exists};
use crate::schema::table::TableSpec;
use serde::Serialize;
use tracing::{debug, instrument};

/// Whether an expected table exists in the live database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableState {
    /// The table exists
    Present,
    /// No table of that name (any case)
    Missing,
}

/// A live column whose declared type has a different affinity than expected.
/// Reported only; additive patching never rewrites existing columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeMismatch {
    /// Live column name
    pub column: String,
    /// Type declared in the manifest
    pub expected: String,
    /// Type declared in the database
    pub live: String,
}

/// Work needed to bring one table up to the manifest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePlan {
    /// Table name from the manifest
    pub table: Identifier,
    /// Whether the table exists
    pub state: TableState,
    /// Expected columns absent from the live table, in manifest order.
    pub missing_columns: Vec<Identifier>,
    /// Live columns the manifest does not mention.
    pub extra_columns: Vec<String>,
    /// Columns present with a different type affinity
    pub type_mismatches: Vec<TypeMismatch>,
}

impl TablePlan {
    /// Whether `apply` would change anything for this table.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        self.state == TableState::Missing || !self.missing_columns.is_empty()
    }
}

/// Pure set difference between `spec` and the live columns (`None` when the
/// table does not exist).
#[must_use]
pub fn plan_table(spec: &TableSpec, live: Option<&[LiveColumn]>) -> TablePlan {
    let Some(live) = live else {
        return TablePlan {
            table: spec.name.clone(),
            state: TableState::Missing,
            missing_columns: spec.columns.iter().map(|c| c.name.clone()).collect(),
            extra_columns: Vec::new(),
            type_mismatches: Vec::new(),
        };
    };

    let mut missing_columns = Vec::new();
    let mut type_mismatches = Vec::new();
    for expected in &spec.columns {
        match live.iter().find(|l| expected.name.matches(&l.name)) {
            None => missing_columns.push(expected.name.clone()),
            Some(found) => {
                if Affinity::of_declared(&found.decl_type) != expected.column_type.affinity() {
                    type_mismatches.push(TypeMismatch {
                        column: found.name.clone(),
                        expected: expected.column_type.to_string(),
                        live: found.decl_type.clone(),
                    });
                }
            }
        }
    }

    let extra_columns = live
        .iter()
        .filter(|l| spec.column(&l.name).is_none())
        .map(|l| l.name.clone())
        .collect();

    TablePlan {
        table: spec.name.clone(),
        state: TableState::Present,
        missing_columns,
        extra_columns,
        type_mismatches,
    }
}

/// Introspects and plans every manifest table selected by `filter`
/// (empty filter selects all).
#[instrument(skip(db, manifest))]
pub async fn plan_database<C: sea_orm::ConnectionTrait>(
    db: &C,
    manifest: &Manifest,
    filter: &[String],
) -> Result<Vec<TablePlan>> {
    let mut plans = Vec::new();
    for spec in manifest.tables_matching(filter) {
        let plan = if table_exists(db, &spec.name).await? {
            let live = table_columns(db, &spec.name).await?;
            plan_table(spec, Some(live.as_slice()))
        } else {
            plan_table(spec, None)
        };
        debug!(
            "Planned {}: {:?}, {} missing column(s)",
            plan.table,
            plan.state,
            plan.missing_columns.len()
        );
        plans.push(plan);
    }
    Ok(plans)
}
