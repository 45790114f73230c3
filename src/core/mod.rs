//! Core reconciliation logic - framework-agnostic planning, patching and reporting.

/// Applied-patch history table
pub mod history;
/// Per-column transactional patching
pub mod reconcile;
/// Outcome reports and their rendering
pub mod report;
