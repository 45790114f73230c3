//! Expected column definitions and the DDL generated from them.

use crate::errors::{Error, Result};
use crate::schema::identifier::Identifier;
use serde::Deserialize;
use std::fmt;

/// Declared SQL type of an expected column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ColumnType {
    /// `INTEGER`
    Integer,
    /// `REAL`
    Real,
    /// `NUMERIC`
    Numeric,
    /// `TEXT`
    Text,
    /// `VARCHAR(n)`; SQLite does not enforce the length
    Varchar(u32),
    /// `BOOLEAN`, stored as 0/1
    Boolean,
    /// `DATE`
    Date,
    /// `DATETIME`
    DateTime,
    /// `BLOB`
    Blob,
}

/// SQLite type affinity, derived from a declared type with the rules of
/// section 3.1 of the SQLite datatype documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// Declared type contains `INT`
    Integer,
    /// Contains `CHAR`, `CLOB` or `TEXT`
    Text,
    /// Contains `BLOB`, or no type at all
    Blob,
    /// Contains `REAL`, `FLOA` or `DOUB`
    Real,
    /// Anything else
    Numeric,
}

impl Affinity {
    /// Affinity SQLite assigns to a column declared as `decl`.
    #[must_use]
    pub fn of_declared(decl: &str) -> Self {
        let upper = decl.to_ascii_uppercase();
        if upper.contains("INT") {
            Self::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Self::Text
        } else if upper.contains("BLOB") || upper.trim().is_empty() {
            Self::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Self::Real
        } else {
            Self::Numeric
        }
    }
}

impl ColumnType {
    /// Affinity of the declared type.
    #[must_use]
    pub fn affinity(self) -> Affinity {
        Affinity::of_declared(&self.to_string())
    }
}

impl std::str::FromStr for ColumnType {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        let parsed = match normalized.as_str() {
            "INTEGER" | "INT" | "BIGINT" => Some(Self::Integer),
            "REAL" | "FLOAT" | "DOUBLE" => Some(Self::Real),
            "NUMERIC" | "DECIMAL" => Some(Self::Numeric),
            "TEXT" | "STRING" => Some(Self::Text),
            "BOOLEAN" | "BOOL" => Some(Self::Boolean),
            "DATE" => Some(Self::Date),
            "DATETIME" | "TIMESTAMP" => Some(Self::DateTime),
            "BLOB" => Some(Self::Blob),
            other => other
                .strip_prefix("VARCHAR(")
                .and_then(|rest| rest.strip_suffix(')'))
                .and_then(|len| len.trim().parse::<u32>().ok())
                .filter(|len| *len > 0)
                .map(Self::Varchar),
        };

        parsed.ok_or_else(|| Error::Manifest {
            message: format!("unsupported column type {raw:?}"),
        })
    }
}

impl TryFrom<String> for ColumnType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("INTEGER"),
            Self::Real => f.write_str("REAL"),
            Self::Numeric => f.write_str("NUMERIC"),
            Self::Text => f.write_str("TEXT"),
            Self::Varchar(len) => write!(f, "VARCHAR({len})"),
            Self::Boolean => f.write_str("BOOLEAN"),
            Self::Date => f.write_str("DATE"),
            Self::DateTime => f.write_str("DATETIME"),
            Self::Blob => f.write_str("BLOB"),
        }
    }
}

/// Default value attached to an expected column.
#[derive(Debug, Clone, PartialEq)]
pub enum DefaultValue {
    /// Integer literal
    Integer(i64),
    /// Finite floating-point literal
    Real(f64),
    /// String literal, quoted when rendered
    Text(String),
    /// Rendered as 1 or 0
    Boolean(bool),
    /// Not a constant: SQLite refuses it in `ADD COLUMN`, so the column is
    /// added bare and existing rows are backfilled.
    CurrentTimestamp,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDefault {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for DefaultValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(match RawDefault::deserialize(deserializer)? {
            RawDefault::Boolean(b) => Self::Boolean(b),
            RawDefault::Integer(i) => Self::Integer(i),
            RawDefault::Real(r) => Self::Real(r),
            RawDefault::Text(s) if s.eq_ignore_ascii_case("CURRENT_TIMESTAMP") => {
                Self::CurrentTimestamp
            }
            RawDefault::Text(s) => Self::Text(s),
        })
    }
}

impl DefaultValue {
    /// SQL literal for a `DEFAULT` clause.
    #[must_use]
    pub fn to_sql(&self) -> String {
        match self {
            Self::Integer(i) => i.to_string(),
            Self::Real(r) => r.to_string(),
            Self::Text(s) => format!("'{}'", s.replace('\'', "''")),
            Self::Boolean(b) => u8::from(*b).to_string(),
            Self::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
        }
    }

    /// Whether SQLite accepts this default in `ADD COLUMN`.
    #[must_use]
    pub const fn is_constant(&self) -> bool {
        !matches!(self, Self::CurrentTimestamp)
    }
}

/// One column the application model expects to exist.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnSpec {
    /// Column name
    pub name: Identifier,
    /// Declared type, written `type` in the manifest
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Default value; absent means NULL
    #[serde(default)]
    pub default: Option<DefaultValue>,
    /// Add a NOT NULL constraint (requires a constant default)
    #[serde(default)]
    pub not_null: bool,
}

impl ColumnSpec {
    /// Nullable column without a default.
    #[must_use]
    pub fn new(name: Identifier, column_type: ColumnType) -> Self {
        Self {
            name,
            column_type,
            default: None,
            not_null: false,
        }
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Rejects definitions SQLite would refuse in `ALTER TABLE ... ADD COLUMN`.
    pub fn validate(&self, table: &Identifier) -> Result<()> {
        let invalid = |message: &str| Error::InvalidColumn {
            table: table.to_string(),
            column: self.name.to_string(),
            message: message.to_string(),
        };

        match &self.default {
            Some(DefaultValue::Real(r)) if !r.is_finite() => {
                Err(invalid("default must be a finite number"))
            }
            Some(DefaultValue::CurrentTimestamp) if self.not_null => Err(invalid(
                "NOT NULL cannot be combined with a CURRENT_TIMESTAMP default",
            )),
            None if self.not_null => Err(invalid("NOT NULL requires a constant default")),
            _ => Ok(()),
        }
    }

    /// Column definition used inside `CREATE TABLE`.
    #[must_use]
    pub fn definition_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name.quoted(), self.column_type);
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql());
        }
        sql
    }

    /// The `ALTER TABLE ... ADD COLUMN` statement for this column.
    #[must_use]
    pub fn add_column_sql(&self, table: &Identifier) -> String {
        let mut sql = format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            table.quoted(),
            self.name.quoted(),
            self.column_type
        );
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if let Some(default) = self.default.as_ref().filter(|d| d.is_constant()) {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql());
        }
        sql
    }

    /// Follow-up statement filling existing rows when the default could not
    /// be expressed in `ADD COLUMN`.
    #[must_use]
    pub fn backfill_sql(&self, table: &Identifier) -> Option<String> {
        self.default
            .as_ref()
            .filter(|d| !d.is_constant())
            .map(|d| {
                format!(
                    "UPDATE {table} SET {col} = {value} WHERE {col} IS NULL",
                    table = table.quoted(),
                    col = self.name.quoted(),
                    value = d.to_sql()
                )
            })
    }
}
