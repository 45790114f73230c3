use thiserror::Error;

/// Errors raised by the reconciler.
#[derive(Debug, Error)]
pub enum Error {
    /// Unreadable manifest file or invalid environment setting
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Manifest content that does not describe a valid schema
    #[error("Manifest error: {message}")]
    Manifest {
        /// What went wrong
        message: String,
    },

    /// Name outside `[A-Za-z_][A-Za-z0-9_]*`
    #[error("Invalid SQL identifier: {name:?}")]
    InvalidIdentifier {
        /// The rejected name
        name: String,
    },

    /// Column definition SQLite would refuse in `ADD COLUMN`
    #[error("Invalid column {table}.{column}: {message}")]
    InvalidColumn {
        /// Table declaring the column
        table: String,
        /// Offending column
        column: String,
        /// Why the definition is refused
        message: String,
    },

    /// Database file absent and creation not requested
    #[error("Database file not found: {path}")]
    DatabaseNotFound {
        /// Path that was looked up
        path: String,
    },

    /// `SeaORM` or `SQLite` failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON rendering failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Text rendering failure
    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
