//! Subcommand execution.
//!
//! Each command processes every configured database independently and
//! returns its rendered output together with the process exit code, so the
//! binary only has to print and exit.

use crate::{
    cli::{Command, OutputFormat},
    config::{database, manifest::Manifest, settings::Settings},
    core::{
        history::list_patches,
        reconcile::{ReconcileOptions, reconcile_path},
        report::{DatabaseReport, render_json, render_text},
    },
    entities::PatchHistoryModel,
    errors::Result,
    schema::introspect::{LiveColumn, columns_of, list_tables},
};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Every database was processed without failures.
pub const EXIT_OK: u8 = 0;
/// At least one database, table or column failed.
pub const EXIT_FAILURE: u8 = 1;
/// `check` found columns or tables that `apply` would add.
pub const EXIT_DRIFT: u8 = 2;

/// Rendered result of one subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Text or JSON to print on stdout
    pub stdout: String,
    /// Process exit code, one of the `EXIT_*` constants
    pub exit_code: u8,
}

/// Runs `command` against every database in `settings`.
///
/// # Errors
/// Returns an error only for problems that concern the whole run, such as an
/// unreadable manifest; per-database problems are part of the output.
#[instrument(skip(settings))]
pub async fn run(
    command: Command,
    settings: &Settings,
    format: OutputFormat,
) -> Result<CommandOutput> {
    match command {
        Command::Check => reconcile_all(settings, format, true).await,
        Command::Apply => reconcile_all(settings, format, false).await,
        Command::Inspect => inspect_all(settings, format).await,
        Command::History => history_all(settings, format).await,
    }
}

fn warn_unknown_tables(manifest: &Manifest, tables: &[String]) {
    for name in tables {
        if manifest.table(name).is_none() {
            warn!("Table filter {:?} matches no manifest table", name);
        }
    }
}

async fn reconcile_all(
    settings: &Settings,
    format: OutputFormat,
    dry_run: bool,
) -> Result<CommandOutput> {
    let manifest = settings.manifest()?;
    warn_unknown_tables(&manifest, &settings.tables);

    let options = ReconcileOptions {
        dry_run,
        record_history: settings.record_history,
        tables: settings.tables.clone(),
    };

    let mut reports: Vec<DatabaseReport> = Vec::with_capacity(settings.databases.len());
    for path in &settings.databases {
        info!("Processing {}", path.display());
        reports.push(reconcile_path(path, &manifest, &options, settings.create_missing_db).await);
    }

    let exit_code = if reports.iter().any(DatabaseReport::has_failures) {
        EXIT_FAILURE
    } else if dry_run && reports.iter().any(DatabaseReport::has_drift) {
        EXIT_DRIFT
    } else {
        EXIT_OK
    };

    let stdout = match format {
        OutputFormat::Text => render_text(&reports)?,
        OutputFormat::Json => render_json(&reports)?,
    };
    Ok(CommandOutput { stdout, exit_code })
}

#[derive(Debug, Serialize)]
struct InspectedTable {
    name: String,
    columns: Vec<LiveColumn>,
}

#[derive(Debug, Serialize)]
struct InspectReport {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    tables: Vec<InspectedTable>,
}

async fn inspect_one(path: &Path) -> Result<Vec<InspectedTable>> {
    let db = database::connect(path, false).await?;
    let mut tables = Vec::new();
    for name in list_tables(&db).await? {
        let columns = columns_of(&db, &name).await?;
        tables.push(InspectedTable { name, columns });
    }
    db.close().await?;
    Ok(tables)
}

fn render_inspect_text(reports: &[InspectReport]) -> Result<String> {
    let mut out = String::new();
    for report in reports {
        writeln!(out, "== {}", report.path)?;
        if let Some(error) = &report.error {
            writeln!(out, "  ERROR: {error}")?;
        }
        for table in &report.tables {
            let columns: Vec<String> = table
                .columns
                .iter()
                .map(|c| format!("{} {}", c.name, c.decl_type).trim_end().to_string())
                .collect();
            writeln!(out, "  {}({})", table.name, columns.join(", "))?;
        }
    }
    Ok(out)
}

async fn inspect_all(settings: &Settings, format: OutputFormat) -> Result<CommandOutput> {
    let mut reports = Vec::with_capacity(settings.databases.len());
    for path in &settings.databases {
        let path_str = path.display().to_string();
        reports.push(match inspect_one(path).await {
            Ok(tables) => InspectReport {
                path: path_str,
                error: None,
                tables,
            },
            Err(e) => InspectReport {
                path: path_str,
                error: Some(e.to_string()),
                tables: Vec::new(),
            },
        });
    }

    let exit_code = if reports.iter().any(|r| r.error.is_some()) {
        EXIT_FAILURE
    } else {
        EXIT_OK
    };

    let stdout = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&reports)?,
        OutputFormat::Text => render_inspect_text(&reports)?,
    };
    Ok(CommandOutput { stdout, exit_code })
}

#[derive(Debug, Serialize)]
struct HistoryReport {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    patches: Vec<PatchHistoryModel>,
}

async fn history_one(path: &Path) -> Result<Vec<PatchHistoryModel>> {
    let db = database::connect(path, false).await?;
    let patches = list_patches(&db).await?;
    db.close().await?;
    Ok(patches)
}

fn render_history_text(reports: &[HistoryReport]) -> Result<String> {
    let mut out = String::new();
    for report in reports {
        writeln!(out, "== {}", report.path)?;
        if let Some(error) = &report.error {
            writeln!(out, "  ERROR: {error}")?;
        } else if report.patches.is_empty() {
            writeln!(out, "  no recorded patches")?;
        }
        for patch in &report.patches {
            writeln!(
                out,
                "  {} {}.{}",
                patch.applied_at.format("%Y-%m-%d %H:%M:%S"),
                patch.table_name,
                patch.column_name
            )?;
        }
    }
    Ok(out)
}

async fn history_all(settings: &Settings, format: OutputFormat) -> Result<CommandOutput> {
    let mut reports = Vec::with_capacity(settings.databases.len());
    for path in &settings.databases {
        let path_str = path.display().to_string();
        reports.push(match history_one(path).await {
            Ok(patches) => HistoryReport {
                path: path_str,
                error: None,
                patches,
            },
            Err(e) => HistoryReport {
                path: path_str,
                error: Some(e.to_string()),
                patches: Vec::new(),
            },
        });
    }

    let exit_code = if reports.iter().any(|r| r.error.is_some()) {
        EXIT_FAILURE
    } else {
        EXIT_OK
    };

    let stdout = match format {
        OutputFormat::Json => serde_json::to_string_pretty(&reports)?,
        OutputFormat::Text => render_history_text(&reports)?,
    };
    Ok(CommandOutput { stdout, exit_code })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{LEGACY_MANIFEST, init_test_tracing};
    use sea_orm::ConnectionTrait;
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        settings: Settings,
    }

    async fn fixture() -> Result<Fixture> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("erp.db");
        let manifest_path = dir.path().join("expected.toml");
        std::fs::write(&manifest_path, LEGACY_MANIFEST)?;

        let db = database::connect(&db_path, true).await?;
        db.execute_unprepared(
            "CREATE TABLE events (id INTEGER PRIMARY KEY, name TEXT NOT NULL, event_date DATE);
             CREATE TABLE users (id INTEGER PRIMARY KEY, username TEXT NOT NULL);",
        )
        .await?;
        db.close().await?;

        let settings = Settings {
            databases: vec![db_path],
            manifest_path: Some(manifest_path),
            tables: Vec::new(),
            record_history: true,
            create_missing_db: false,
        };
        Ok(Fixture {
            _dir: dir,
            settings,
        })
    }

    #[tokio::test]
    async fn test_check_apply_check_cycle() -> Result<()> {
        init_test_tracing();
        let fx = fixture().await?;

        let before = run(Command::Check, &fx.settings, OutputFormat::Text).await?;
        assert_eq!(before.exit_code, EXIT_DRIFT);
        assert!(before.stdout.contains("events.guest_count: would run"));
        assert!(before.stdout.contains("incidents: table missing, would be created"));

        let applied = run(Command::Apply, &fx.settings, OutputFormat::Text).await?;
        assert_eq!(applied.exit_code, EXIT_OK);
        assert!(applied.stdout.contains("events.guest_count: added"));
        assert!(applied.stdout.contains("incidents: table created"));

        let after = run(Command::Check, &fx.settings, OutputFormat::Text).await?;
        assert_eq!(after.exit_code, EXIT_OK);
        assert!(after.stdout.contains("0 planned, 0 failed"));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_database_fails_but_others_run() -> Result<()> {
        let mut fx = fixture().await?;
        fx.settings
            .databases
            .insert(0, PathBuf::from("/nonexistent/dir/erp.db"));

        let output = run(Command::Apply, &fx.settings, OutputFormat::Json).await?;
        assert_eq!(output.exit_code, EXIT_FAILURE);

        let json: serde_json::Value = serde_json::from_str(&output.stdout)?;
        assert!(json[0]["error"].as_str().unwrap_or_default().contains("not found"));
        assert!(json[1].get("error").is_none());
        assert_eq!(json[1]["tables"][0]["table"], "events");
        Ok(())
    }

    #[tokio::test]
    async fn test_history_and_inspect_after_apply() -> Result<()> {
        let fx = fixture().await?;
        run(Command::Apply, &fx.settings, OutputFormat::Text).await?;

        let history = run(Command::History, &fx.settings, OutputFormat::Json).await?;
        assert_eq!(history.exit_code, EXIT_OK);
        let json: serde_json::Value = serde_json::from_str(&history.stdout)?;
        let patches = json[0]["patches"].as_array().map(Vec::len);
        assert_eq!(patches, Some(7));

        let inspect = run(Command::Inspect, &fx.settings, OutputFormat::Text).await?;
        assert_eq!(inspect.exit_code, EXIT_OK);
        assert!(inspect.stdout.contains(
            "users(id INTEGER, username TEXT, email VARCHAR(120), is_active BOOLEAN, role TEXT)"
        ));
        assert!(inspect.stdout.contains("schema_patch_history("));
        Ok(())
    }

    #[tokio::test]
    async fn test_inspect_lists_tables_with_unusual_names() -> Result<()> {
        let fx = fixture().await?;
        let db = database::connect(&fx.settings.databases[0], false).await?;
        db.execute_unprepared(r#"CREATE TABLE "Menu Specials-2024" (dish TEXT, price REAL)"#)
            .await?;
        db.close().await?;

        let inspect = run(Command::Inspect, &fx.settings, OutputFormat::Text).await?;
        assert_eq!(inspect.exit_code, EXIT_OK);
        assert!(inspect.stdout.contains("Menu Specials-2024(dish TEXT, price REAL)"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_manifest_aborts_run() -> Result<()> {
        let mut fx = fixture().await?;
        fx.settings.manifest_path = Some(PathBuf::from("/nonexistent/expected.toml"));

        let result = run(Command::Check, &fx.settings, OutputFormat::Text).await;
        assert!(matches!(result, Err(crate::errors::Error::Config { message: _ })));
        Ok(())
    }
}
