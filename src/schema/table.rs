use crate::errors::{Error, Result};
use crate::schema::column::ColumnSpec;
use crate::schema::identifier::Identifier;
use serde::Deserialize;
use std::collections::HashSet;

/// Expected shape of one table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TableSpec {
    /// Table name
    pub name: Identifier,
    /// Create the table when it is absent instead of skipping it.
    #[serde(default)]
    pub create_if_missing: bool,
    /// Expected columns in order
    #[serde(default)]
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    /// Checks every column and rejects duplicate column names (case-insensitive).
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            column.validate(&self.name)?;
            if !seen.insert(column.name.as_str().to_ascii_lowercase()) {
                return Err(Error::Manifest {
                    message: format!(
                        "column {} is declared twice in table {}",
                        column.name, self.name
                    ),
                });
            }
        }
        Ok(())
    }

    /// Looks up a column by name, ignoring ASCII case.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name.matches(name))
    }

    /// `CREATE TABLE IF NOT EXISTS` with a surrogate `id` key unless the
    /// manifest declares `id` itself.
    #[must_use]
    pub fn create_table_sql(&self) -> String {
        let mut definitions = Vec::with_capacity(self.columns.len() + 1);
        if self.column("id").is_none() {
            definitions.push("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT".to_string());
        }
        definitions.extend(self.columns.iter().map(ColumnSpec::definition_sql));
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.name.quoted(),
            definitions.join(", ")
        )
    }
}
