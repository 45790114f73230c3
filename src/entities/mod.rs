//! Entity module - `SeaORM` entities owned by the reconciler itself.
//! The application tables being reconciled are never modelled here; they are
//! read through introspection only.

/// `schema_patch_history` rows
pub mod patch_history;

pub use patch_history::{Entity as PatchHistory, Model as PatchHistoryModel};
