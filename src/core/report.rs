//! Reconciliation reports and their text/JSON rendering.
//!
//! Reports are plain data: per-column and per-database failures are recorded
//! here instead of being returned as errors, so one bad column or one
//! unreachable file never hides the results for the rest.

use crate::errors::Result;
use crate::schema::diff::TypeMismatch;
use crate::schema::identifier::Identifier;
use serde::Serialize;
use std::fmt::{self, Write as _};

/// What happened to one expected column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ColumnOutcome {
    /// The column was added and committed.
    Added,
    /// SQLite reported a duplicate column: someone else added it first.
    AlreadyPresent,
    /// Dry run: the statement would be executed.
    Planned,
    /// The statement failed and its transaction was rolled back.
    Failed {
        /// Database error text
        reason: String,
    },
}

/// Report entry for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnReport {
    /// Column name from the manifest
    pub column: Identifier,
    /// `ALTER TABLE` statement, or the column definition for created tables
    pub statement: String,
    /// What happened
    #[serde(flatten)]
    pub outcome: ColumnOutcome,
}

/// What happened to one expected table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    /// The table existed; its missing columns were processed.
    Reconciled,
    /// The table was absent and has been created.
    Created,
    /// Dry run: the absent table would be created.
    WouldCreate,
    /// The table was absent and is not created by the reconciler.
    SkippedMissing,
    /// `CREATE TABLE` failed; no column was processed.
    CreateFailed {
        /// Database error text
        reason: String,
    },
}

/// Report entry for one manifest table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableReport {
    /// Table name from the manifest
    pub table: Identifier,
    /// What happened to the table as a whole
    #[serde(flatten)]
    pub outcome: TableOutcome,
    /// `CREATE TABLE` statement for created (or to-be-created) tables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    /// Missing columns in manifest order
    pub columns: Vec<ColumnReport>,
    /// Live columns the manifest does not mention
    pub extra_columns: Vec<String>,
    /// Live columns whose type affinity differs, left unchanged
    pub type_mismatches: Vec<TypeMismatch>,
}

impl TableReport {
    fn count(&self, wanted: fn(&ColumnOutcome) -> bool) -> usize {
        self.columns.iter().filter(|c| wanted(&c.outcome)).count()
    }

    /// Number of columns added.
    #[must_use]
    pub fn added(&self) -> usize {
        self.count(|o| matches!(o, ColumnOutcome::Added))
    }

    /// Number of columns found already present at apply time.
    #[must_use]
    pub fn already_present(&self) -> usize {
        self.count(|o| matches!(o, ColumnOutcome::AlreadyPresent))
    }

    /// Number of columns a dry run would add.
    #[must_use]
    pub fn planned(&self) -> usize {
        self.count(|o| matches!(o, ColumnOutcome::Planned))
    }

    /// Number of columns whose transaction was rolled back.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ColumnOutcome::Failed { .. }))
    }

    /// Whether the table or any of its columns failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        matches!(self.outcome, TableOutcome::CreateFailed { .. }) || self.failed() > 0
    }
}

/// Result of processing one database file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseReport {
    /// Database file as given
    pub path: String,
    /// One entry per selected manifest table
    pub tables: Vec<TableReport>,
    /// Set when the database could not be opened or introspected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Totals across tables, used for summary lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    /// Columns added
    pub added: usize,
    /// Columns already present at apply time
    pub already_present: usize,
    /// Columns a dry run would add
    pub planned: usize,
    /// Columns rolled back
    pub failed: usize,
    /// Tables created
    pub tables_created: usize,
    /// Absent tables left alone
    pub tables_skipped: usize,
}

impl DatabaseReport {
    /// Report for a database that was opened and reconciled.
    #[must_use]
    pub fn new(path: String, tables: Vec<TableReport>) -> Self {
        Self {
            path,
            tables,
            error: None,
        }
    }

    /// Report for a database that could not be processed at all.
    #[must_use]
    pub fn failed(path: String, error: String) -> Self {
        Self {
            path,
            tables: Vec::new(),
            error: Some(error),
        }
    }

    /// Sums the per-table counters.
    #[must_use]
    pub fn totals(&self) -> Totals {
        self.tables.iter().fold(Totals::default(), |mut acc, t| {
            acc.added += t.added();
            acc.already_present += t.already_present();
            acc.planned += t.planned();
            acc.failed += t.failed();
            match t.outcome {
                TableOutcome::Created => acc.tables_created += 1,
                TableOutcome::SkippedMissing => acc.tables_skipped += 1,
                _ => {}
            }
            acc
        })
    }

    /// Whether the database, a table or a column failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.error.is_some() || self.tables.iter().any(TableReport::has_failures)
    }

    /// Dry-run drift: columns or tables that `apply` would add.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        self.tables
            .iter()
            .any(|t| t.outcome == TableOutcome::WouldCreate || t.planned() > 0)
    }
}

fn render_column(out: &mut String, table: &Identifier, column: &ColumnReport) -> fmt::Result {
    let name = &column.column;
    match &column.outcome {
        ColumnOutcome::Added => writeln!(out, "  {table}.{name}: added"),
        ColumnOutcome::AlreadyPresent => writeln!(out, "  {table}.{name}: already present"),
        ColumnOutcome::Planned => {
            writeln!(out, "  {table}.{name}: would run `{}`", column.statement)
        }
        ColumnOutcome::Failed { reason } => writeln!(out, "  {table}.{name}: FAILED ({reason})"),
    }
}

fn render_table(out: &mut String, table: &TableReport) -> fmt::Result {
    let name = &table.table;
    match &table.outcome {
        TableOutcome::Reconciled => {}
        TableOutcome::Created => writeln!(out, "  {name}: table created")?,
        TableOutcome::WouldCreate => writeln!(out, "  {name}: table missing, would be created")?,
        TableOutcome::SkippedMissing => writeln!(out, "  {name}: table missing, skipped")?,
        TableOutcome::CreateFailed { reason } => {
            writeln!(out, "  {name}: FAILED to create table ({reason})")?;
        }
    }

    if table.outcome != TableOutcome::Created {
        for column in &table.columns {
            render_column(out, name, column)?;
        }
    }
    for mismatch in &table.type_mismatches {
        writeln!(
            out,
            "  {name}.{}: declared {}, expected {} (left unchanged)",
            mismatch.column, mismatch.live, mismatch.expected
        )?;
    }
    Ok(())
}

/// Renders a human-readable report, one block per database.
///
/// # Arguments
/// * `reports` - Per-database results in processing order
///
/// # Returns
/// The report text, ending with a summary line for each reachable database
pub fn render_text(reports: &[DatabaseReport]) -> Result<String> {
    let mut out = String::new();
    for report in reports {
        writeln!(out, "== {}", report.path)?;
        if let Some(error) = &report.error {
            writeln!(out, "  ERROR: {error}")?;
            continue;
        }
        for table in &report.tables {
            render_table(&mut out, table)?;
        }
        let totals = report.totals();
        writeln!(
            out,
            "  summary: {} added, {} already present, {} planned, {} failed, {} table(s) created, {} skipped",
            totals.added,
            totals.already_present,
            totals.planned,
            totals.failed,
            totals.tables_created,
            totals.tables_skipped
        )?;
    }
    Ok(out)
}

/// Pretty-printed JSON array of database reports.
pub fn render_json(reports: &[DatabaseReport]) -> Result<String> {
    serde_json::to_string_pretty(reports).map_err(Into::into)
}
