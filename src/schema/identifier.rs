//! Validated SQL identifiers for table and column names.
//!
//! `ALTER TABLE` and `PRAGMA table_info` cannot take bound parameters for
//! names, so every name that ends up inside generated SQL goes through
//! [`Identifier::parse`] first.

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A table or column name restricted to `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Validates `raw` and wraps it.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut chars = raw.chars();
        let valid_head = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

        if valid_head && valid_tail {
            Ok(Self(raw.to_string()))
        } else {
            Err(Error::InvalidIdentifier {
                name: raw.to_string(),
            })
        }
    }

    /// The raw name as written in the manifest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for interpolation into SQL text.
    #[must_use]
    pub fn quoted(&self) -> String {
        quote_name(&self.0)
    }

    /// SQLite compares identifiers case-insensitively (ASCII only).
    #[must_use]
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

/// Double-quotes an arbitrary name, doubling any embedded `"`.
///
/// Used for names read back from the database, which need not be valid
/// identifiers.
#[must_use]
pub fn quote_name(raw: &str) -> String {
    format!("\"{}\"", raw.replace('"', "\"\""))
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identifier {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}
