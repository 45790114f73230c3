//! Built-in expected schema of the catering ERP.
//!
//! Embedded as TOML and parsed through the same loader as user manifests, so a
//! custom manifest can start as a copy of `catering_erp.toml`.

use crate::config::manifest::{Manifest, parse_manifest};
use crate::errors::Result;

const CATERING_ERP_MANIFEST: &str = include_str!("catering_erp.toml");

/// The built-in manifest covering users, events, POS, accounting, HR,
/// incidents and messaging tables.
pub fn catering_erp_manifest() -> Result<Manifest> {
    parse_manifest(CATERING_ERP_MANIFEST)
}
