//! Schema model: expected definitions, live introspection and the diff between them.

/// Expected columns, types and defaults
pub mod column;
/// Expected versus live comparison
pub mod diff;
/// Validated table and column names
pub mod identifier;
/// Live schema queries
pub mod introspect;
/// Expected tables
pub mod table;
