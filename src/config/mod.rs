/// Database file addressing and connection management
pub mod database;

/// Expected-schema manifest loading from TOML
pub mod manifest;

/// Run settings from flags, environment variables and defaults
pub mod settings;
