//! Additive schema reconciliation.
//!
//! Every missing column is applied in its own transaction: the `ADD COLUMN`,
//! an optional backfill and the optional history row commit together or not
//! at all. A failure is recorded on that column and the next column is still
//! attempted, so an interrupted run leaves a partially patched schema that the
//! next run completes.

use crate::{
    config::{database, manifest::Manifest},
    core::{
        history::{ensure_history_table, record_patch},
        report::{ColumnOutcome, ColumnReport, DatabaseReport, TableOutcome, TableReport},
    },
    errors::{Error, Result},
    schema::{
        column::ColumnSpec,
        diff::{TablePlan, TableState, plan_database},
        identifier::Identifier,
        table::TableSpec,
    },
};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, TransactionTrait};
use std::path::Path;
use tracing::{info, instrument, warn};

/// SQLite's message for `ADD COLUMN` on an existing column.
const DUPLICATE_COLUMN: &str = "duplicate column";

/// Options shared by every table of a run.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Plan only; nothing is executed.
    pub dry_run: bool,
    /// Record every added column in `schema_patch_history`.
    pub record_history: bool,
    /// Restrict the run to these tables (case-insensitive); empty means all.
    pub tables: Vec<String>,
}

/// Whether `err` is SQLite refusing `ADD COLUMN` for an existing column.
#[must_use]
pub fn is_duplicate_column_error(err: &DbErr) -> bool {
    err.to_string()
        .to_ascii_lowercase()
        .contains(DUPLICATE_COLUMN)
}

async fn try_apply_column(
    db: &DatabaseConnection,
    table: &Identifier,
    column: &ColumnSpec,
    statement: &str,
    record_history: bool,
) -> Result<()> {
    let txn = db.begin().await?;

    let applied: Result<()> = async {
        txn.execute_unprepared(statement).await?;
        if let Some(backfill) = column.backfill_sql(table) {
            txn.execute_unprepared(&backfill).await?;
        }
        if record_history {
            ensure_history_table(&txn).await?;
            record_patch(&txn, table, &column.name, statement).await?;
        }
        Ok::<(), Error>(())
    }
    .await;

    match applied {
        Ok(()) => {
            txn.commit().await?;
            Ok(())
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                warn!(
                    "Rollback of {}.{} failed: {}",
                    table, column.name, rollback_err
                );
            }
            Err(e)
        }
    }
}

/// Applies one missing column and turns the result into a report entry.
///
/// With `record_history` the history table is created on demand inside the
/// column's transaction, so callers need no setup step.
///
/// # Arguments
/// * `db` - Open database connection
/// * `table` - Table receiving the column
/// * `column` - Expected column definition
/// * `record_history` - Also insert a `schema_patch_history` row
///
/// # Returns
/// A `ColumnReport`; failures are recorded in it rather than returned.
#[instrument(skip(db, column), fields(column = %column.name))]
pub async fn apply_column(
    db: &DatabaseConnection,
    table: &Identifier,
    column: &ColumnSpec,
    record_history: bool,
) -> ColumnReport {
    let statement = column.add_column_sql(table);

    let outcome = match try_apply_column(db, table, column, &statement, record_history).await {
        Ok(()) => {
            info!("Added column {}.{}", table, column.name);
            ColumnOutcome::Added
        }
        Err(Error::Database(e)) if is_duplicate_column_error(&e) => {
            info!("Column {}.{} already present", table, column.name);
            ColumnOutcome::AlreadyPresent
        }
        Err(e) => {
            warn!("Failed to add column {}.{}: {}", table, column.name, e);
            ColumnOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };

    ColumnReport {
        column: column.name.clone(),
        statement,
        outcome,
    }
}

async fn create_table(
    db: &DatabaseConnection,
    spec: &TableSpec,
    statement: &str,
) -> (TableOutcome, Vec<ColumnReport>) {
    match db.execute_unprepared(statement).await {
        Ok(_) => {
            info!("Created table {}", spec.name);
            let columns = spec
                .columns
                .iter()
                .map(|c| ColumnReport {
                    column: c.name.clone(),
                    statement: c.definition_sql(),
                    outcome: ColumnOutcome::Added,
                })
                .collect();
            (TableOutcome::Created, columns)
        }
        Err(e) => {
            warn!("Failed to create table {}: {}", spec.name, e);
            (
                TableOutcome::CreateFailed {
                    reason: e.to_string(),
                },
                Vec::new(),
            )
        }
    }
}

/// Executes (or, in a dry run, describes) the work in `plan` for one table.
#[instrument(skip(db, spec, plan, options), fields(table = %spec.name))]
pub async fn reconcile_table(
    db: &DatabaseConnection,
    spec: &TableSpec,
    plan: &TablePlan,
    options: &ReconcileOptions,
) -> TableReport {
    let mut report = TableReport {
        table: spec.name.clone(),
        outcome: TableOutcome::Reconciled,
        statement: None,
        columns: Vec::new(),
        extra_columns: plan.extra_columns.clone(),
        type_mismatches: plan.type_mismatches.clone(),
    };

    if plan.state == TableState::Missing {
        if !spec.create_if_missing {
            info!("Table {} does not exist, skipping", spec.name);
            report.outcome = TableOutcome::SkippedMissing;
            return report;
        }

        let statement = spec.create_table_sql();
        if options.dry_run {
            report.outcome = TableOutcome::WouldCreate;
        } else {
            let (outcome, columns) = create_table(db, spec, &statement).await;
            report.outcome = outcome;
            report.columns = columns;
        }
        report.statement = Some(statement);
        return report;
    }

    for missing in &plan.missing_columns {
        let Some(column) = spec.column(missing.as_str()) else {
            continue;
        };

        let entry = if options.dry_run {
            ColumnReport {
                column: column.name.clone(),
                statement: column.add_column_sql(&spec.name),
                outcome: ColumnOutcome::Planned,
            }
        } else {
            apply_column(db, &spec.name, column, options.record_history).await
        };
        report.columns.push(entry);
    }

    report
}

/// Plans and reconciles every selected manifest table of one open database.
///
/// # Errors
/// Only introspection and history-table setup errors are returned; column
/// and table failures are recorded in the reports.
#[instrument(skip(db, manifest, options))]
pub async fn reconcile_database(
    db: &DatabaseConnection,
    manifest: &Manifest,
    options: &ReconcileOptions,
) -> Result<Vec<TableReport>> {
    if options.record_history && !options.dry_run {
        ensure_history_table(db).await?;
    }

    let specs = manifest.tables_matching(&options.tables);
    let plans = plan_database(db, manifest, &options.tables).await?;

    let mut reports = Vec::with_capacity(plans.len());
    for (spec, plan) in specs.into_iter().zip(plans.iter()) {
        reports.push(reconcile_table(db, spec, plan, options).await);
    }
    Ok(reports)
}

/// Opens the database at `path`, reconciles it and closes it again.
/// Connection and introspection errors end up in the report.
#[instrument(skip(manifest, options))]
pub async fn reconcile_path(
    path: &Path,
    manifest: &Manifest,
    options: &ReconcileOptions,
    create_missing_db: bool,
) -> DatabaseReport {
    let path_str = path.display().to_string();

    let db = match database::connect(path, create_missing_db && !options.dry_run).await {
        Ok(db) => db,
        Err(e) => {
            warn!("Skipping {}: {}", path_str, e);
            return DatabaseReport::failed(path_str, e.to_string());
        }
    };

    let report = match reconcile_database(&db, manifest, options).await {
        Ok(tables) => DatabaseReport::new(path_str, tables),
        Err(e) => {
            warn!("Reconciliation of {} aborted: {}", path_str, e);
            DatabaseReport::failed(path_str, e.to_string())
        }
    };

    if let Err(e) = db.close().await {
        warn!("Failed to close database {}: {}", path.display(), e);
    }
    report
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::manifest::parse_manifest;
    use crate::core::history::list_patches;
    use crate::schema::introspect::{list_tables, table_columns};
    use crate::test_utils::{LEGACY_MANIFEST, ident, init_test_tracing, setup_legacy_db};
    use sea_orm::Statement;

    async fn column_names(db: &DatabaseConnection, table: &str) -> Result<Vec<String>> {
        Ok(table_columns(db, &ident(table))
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    fn apply_options() -> ReconcileOptions {
        ReconcileOptions {
            record_history: true,
            ..ReconcileOptions::default()
        }
    }

    #[tokio::test]
    async fn test_apply_adds_missing_columns_and_creates_tables() -> Result<()> {
        init_test_tracing();
        let db = setup_legacy_db().await?;
        let manifest = parse_manifest(LEGACY_MANIFEST)?;

        let reports = reconcile_database(&db, &manifest, &apply_options()).await?;
        assert_eq!(reports.len(), 3);

        assert_eq!(reports[0].outcome, TableOutcome::Reconciled);
        assert_eq!(reports[0].added(), 4);
        assert_eq!(reports[1].added(), 3);
        assert_eq!(reports[2].outcome, TableOutcome::Created);
        assert!(reports.iter().all(|r| !r.has_failures()));

        assert_eq!(
            column_names(&db, "events").await?,
            vec!["id", "name", "event_date", "guest_count", "venue", "status", "updated_at"]
        );
        assert_eq!(
            column_names(&db, "incidents").await?,
            vec!["id", "title", "severity", "reported_at"]
        );

        // Existing rows pick up defaults and the timestamp backfill.
        let row = db
            .query_one(Statement::from_string(
                db.get_database_backend(),
                "SELECT guest_count, status, updated_at FROM events",
            ))
            .await?
            .unwrap();
        assert_eq!(row.try_get::<i64>("", "guest_count")?, 0);
        assert_eq!(row.try_get::<String>("", "status")?, "draft");
        assert!(row.try_get::<Option<String>>("", "updated_at")?.is_some());

        let patches = list_patches(&db).await?;
        assert_eq!(patches.len(), 7);
        Ok(())
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op() -> Result<()> {
        let db = setup_legacy_db().await?;
        let manifest = parse_manifest(LEGACY_MANIFEST)?;

        reconcile_database(&db, &manifest, &apply_options()).await?;
        let second = reconcile_database(&db, &manifest, &apply_options()).await?;

        assert!(second.iter().all(|r| r.outcome == TableOutcome::Reconciled));
        assert!(second.iter().all(|r| r.columns.is_empty()));
        assert_eq!(list_patches(&db).await?.len(), 7);
        Ok(())
    }

    #[tokio::test]
    async fn test_dry_run_leaves_schema_untouched() -> Result<()> {
        let db = setup_legacy_db().await?;
        let manifest = parse_manifest(LEGACY_MANIFEST)?;
        let options = ReconcileOptions {
            dry_run: true,
            record_history: true,
            ..ReconcileOptions::default()
        };

        let reports = reconcile_database(&db, &manifest, &options).await?;
        assert_eq!(reports[0].planned(), 4);
        assert_eq!(reports[2].outcome, TableOutcome::WouldCreate);
        assert!(reports[2].statement.is_some());

        assert_eq!(
            column_names(&db, "events").await?,
            vec!["id", "name", "event_date"]
        );
        assert!(column_names(&db, "incidents").await?.is_empty());
        assert!(list_patches(&db).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_column_counts_as_present() -> Result<()> {
        let db = setup_legacy_db().await?;
        let manifest = parse_manifest(LEGACY_MANIFEST)?;
        let spec = manifest.table("events").unwrap();

        let live = table_columns(&db, &spec.name).await?;
        let stale_plan = crate::schema::diff::plan_table(spec, Some(live.as_slice()));

        // Another process adds the column between planning and applying.
        db.execute_unprepared("ALTER TABLE events ADD COLUMN venue TEXT")
            .await?;

        let report = reconcile_table(&db, spec, &stale_plan, &apply_options()).await;
        let venue = report
            .columns
            .iter()
            .find(|c| c.column.as_str() == "venue")
            .unwrap();
        assert_eq!(venue.outcome, ColumnOutcome::AlreadyPresent);
        assert_eq!(report.added(), 3);
        assert!(!report.has_failures());
        Ok(())
    }

    #[tokio::test]
    async fn test_reconcile_table_creates_history_table_on_demand() -> Result<()> {
        let db = setup_legacy_db().await?;
        let manifest = parse_manifest(LEGACY_MANIFEST)?;
        let spec = manifest.table("users").unwrap();
        let live = table_columns(&db, &spec.name).await?;
        let plan = crate::schema::diff::plan_table(spec, Some(live.as_slice()));

        // No reconcile_database call, so schema_patch_history does not exist yet.
        assert!(column_names(&db, "schema_patch_history").await?.is_empty());

        let report = reconcile_table(&db, spec, &plan, &apply_options()).await;
        let outcomes: Vec<&ColumnOutcome> = report.columns.iter().map(|c| &c.outcome).collect();
        assert_eq!(outcomes, vec![&ColumnOutcome::Added; 3]);

        let recorded: Vec<String> = list_patches(&db)
            .await?
            .into_iter()
            .map(|p| p.column_name)
            .collect();
        assert_eq!(recorded, vec!["email", "is_active", "role"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_failure_is_reported_on_the_table() -> Result<()> {
        let db = setup_legacy_db().await?;
        // Names starting with sqlite_ are reserved, so CREATE TABLE is refused.
        let manifest = parse_manifest(
            r#"
            [[tables]]
            name = "sqlite_ledger"
            create_if_missing = true
            columns = [{ name = "amount", type = "REAL" }]
            "#,
        )?;

        let reports = reconcile_database(&db, &manifest, &ReconcileOptions::default()).await?;
        assert!(matches!(
            &reports[0].outcome,
            TableOutcome::CreateFailed { reason } if reason.contains("reserved")
        ));
        assert!(reports[0].columns.is_empty());
        assert!(reports[0].has_failures());
        assert_eq!(list_tables(&db).await?, vec!["events", "users"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_column_is_rolled_back_and_later_columns_continue() -> Result<()> {
        let db = setup_legacy_db().await?;
        db.execute_unprepared(
            "CREATE TRIGGER events_frozen BEFORE UPDATE ON events
             BEGIN SELECT RAISE(ABORT, 'events are frozen'); END;",
        )
        .await?;

        let manifest = parse_manifest(
            r#"
            [[tables]]
            name = "events"
            columns = [
                { name = "venue", type = "TEXT" },
                { name = "updated_at", type = "DATETIME", default = "CURRENT_TIMESTAMP" },
                { name = "status", type = "TEXT", default = "draft" },
            ]
            "#,
        )?;

        let reports = reconcile_database(&db, &manifest, &apply_options()).await?;
        let outcomes: Vec<&ColumnOutcome> =
            reports[0].columns.iter().map(|c| &c.outcome).collect();
        assert_eq!(outcomes[0], &ColumnOutcome::Added);
        assert!(
            matches!(outcomes[1], ColumnOutcome::Failed { reason } if reason.contains("events are frozen"))
        );
        assert_eq!(outcomes[2], &ColumnOutcome::Added);

        assert_eq!(
            column_names(&db, "events").await?,
            vec!["id", "name", "event_date", "venue", "status"]
        );
        let recorded: Vec<String> = list_patches(&db)
            .await?
            .into_iter()
            .map(|p| p.column_name)
            .collect();
        assert_eq!(recorded, vec!["venue", "status"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_table_is_skipped_unless_created() -> Result<()> {
        let db = setup_legacy_db().await?;
        let manifest = parse_manifest(
            r#"
            [[tables]]
            name = "payroll_runs"
            columns = [{ name = "period", type = "TEXT" }]
            "#,
        )?;

        let reports = reconcile_database(&db, &manifest, &ReconcileOptions::default()).await?;
        assert_eq!(reports[0].outcome, TableOutcome::SkippedMissing);
        assert!(reports[0].columns.is_empty());
        assert!(column_names(&db, "payroll_runs").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_table_filter_limits_work() -> Result<()> {
        let db = setup_legacy_db().await?;
        let manifest = parse_manifest(LEGACY_MANIFEST)?;
        let options = ReconcileOptions {
            tables: vec!["users".to_string()],
            ..ReconcileOptions::default()
        };

        let reports = reconcile_database(&db, &manifest, &options).await?;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].table.as_str(), "users");
        assert_eq!(
            column_names(&db, "events").await?,
            vec!["id", "name", "event_date"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_reconcile_path_reports_missing_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let manifest = parse_manifest(LEGACY_MANIFEST)?;

        let report = reconcile_path(
            &dir.path().join("absent.db"),
            &manifest,
            &ReconcileOptions::default(),
            false,
        )
        .await;
        assert!(report.has_failures());
        assert!(report.error.unwrap().contains("not found"));
        Ok(())
    }

    #[tokio::test]
    async fn test_reconcile_path_persists_changes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("erp.db");
        let seed = database::connect(&path, true).await?;
        seed.execute_unprepared("CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT)")
            .await?;
        seed.close().await?;

        let manifest = parse_manifest(LEGACY_MANIFEST)?;
        let report = reconcile_path(&path, &manifest, &apply_options(), false).await;
        assert!(!report.has_failures());
        assert_eq!(report.totals().added, 3 + 3);
        assert_eq!(report.totals().tables_skipped, 1);

        let reopened = database::connect(&path, false).await?;
        assert_eq!(
            column_names(&reopened, "users").await?,
            vec!["id", "username", "email", "is_active", "role"]
        );
        Ok(())
    }
}
