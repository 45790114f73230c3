//! Expected-schema manifest loading from TOML.
//!
//! A manifest lists the tables the application model expects and, for each
//! table, the columns that must exist:
//!
//! ```toml
//! [[tables]]
//! name = "events"
//! create_if_missing = false
//!
//! [[tables.columns]]
//! name = "guest_count"
//! type = "INTEGER"
//! default = 0
//! not_null = true
//! ```

use crate::errors::{Error, Result};
use crate::schema::table::TableSpec;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// The full expected schema.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Manifest {
    /// Expected tables in processing order
    #[serde(default)]
    pub tables: Vec<TableSpec>,
}

impl Manifest {
    /// Rejects duplicate tables and invalid column definitions.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for table in &self.tables {
            if !seen.insert(table.name.as_str().to_ascii_lowercase()) {
                return Err(Error::Manifest {
                    message: format!("table {} is declared twice", table.name),
                });
            }
            table.validate()?;
        }
        Ok(())
    }

    /// Tables whose name matches one of `filter` (case-insensitive), in
    /// manifest order. An empty filter selects every table.
    #[must_use]
    pub fn tables_matching(&self, filter: &[String]) -> Vec<&TableSpec> {
        self.tables
            .iter()
            .filter(|t| filter.is_empty() || filter.iter().any(|f| t.name.matches(f)))
            .collect()
    }

    /// Looks up a table by name, ignoring ASCII case.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name.matches(name))
    }
}

/// Parses and validates a manifest from TOML text.
pub fn parse_manifest(contents: &str) -> Result<Manifest> {
    let manifest: Manifest = toml::from_str(contents).map_err(|e| Error::Manifest {
        message: format!("Failed to parse manifest: {e}"),
    })?;
    manifest.validate()?;
    Ok(manifest)
}

/// Loads a manifest file.
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML is invalid, or a
/// table/column definition is rejected by validation.
pub fn load_manifest<P: AsRef<Path>>(path: P) -> Result<Manifest> {
    let path_ref = path.as_ref();
    tracing::debug!("Loading manifest from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read manifest file {}: {e}", path_ref.display()),
    })?;
    parse_manifest(&contents)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::schema::column::{ColumnType, DefaultValue};
    use crate::test_utils::LEGACY_MANIFEST;

    #[test]
    fn test_parse_manifest_tables_and_columns() {
        let manifest = parse_manifest(LEGACY_MANIFEST).unwrap();
        assert_eq!(manifest.tables.len(), 3);

        let events = manifest.table("events").unwrap();
        assert!(!events.create_if_missing);
        let guests = events.column("guest_count").unwrap();
        assert_eq!(guests.column_type, ColumnType::Integer);
        assert_eq!(guests.default, Some(DefaultValue::Integer(0)));
        assert!(guests.not_null);

        let status = events.column("status").unwrap();
        assert_eq!(status.column_type, ColumnType::Varchar(20));
        assert_eq!(status.default, Some(DefaultValue::Text("draft".to_string())));

        assert_eq!(
            events.column("updated_at").unwrap().default,
            Some(DefaultValue::CurrentTimestamp)
        );

        let users = manifest.table("USERS").unwrap();
        assert_eq!(
            users.column("is_active").unwrap().default,
            Some(DefaultValue::Boolean(true))
        );
        assert!(manifest.table("incidents").unwrap().create_if_missing);
    }

    #[test]
    fn test_tables_matching_filter() {
        let manifest = parse_manifest(LEGACY_MANIFEST).unwrap();
        assert_eq!(manifest.tables_matching(&[]).len(), 3);

        let picked = manifest.tables_matching(&["incidents".to_string(), "Events".to_string()]);
        let names: Vec<&str> = picked.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["events", "incidents"]);
    }

    #[test]
    fn test_rejects_duplicate_tables() {
        let toml_str = r#"
            [[tables]]
            name = "orders"
            [[tables]]
            name = "Orders"
        "#;
        assert!(matches!(
            parse_manifest(toml_str),
            Err(Error::Manifest { message: _ })
        ));
    }

    #[test]
    fn test_rejects_unsafe_identifier() {
        let toml_str = r#"
            [[tables]]
            name = "orders; DROP TABLE users"
        "#;
        assert!(parse_manifest(toml_str).is_err());
    }

    #[test]
    fn test_rejects_not_null_without_default() {
        let toml_str = r#"
            [[tables]]
            name = "orders"
            columns = [{ name = "total", type = "REAL", not_null = true }]
        "#;
        assert!(matches!(
            parse_manifest(toml_str),
            Err(Error::InvalidColumn { .. })
        ));
    }

    #[test]
    fn test_load_manifest_missing_file() {
        let result = load_manifest("/nonexistent/manifest.toml");
        assert!(matches!(result, Err(Error::Config { message: _ })));
    }
}
