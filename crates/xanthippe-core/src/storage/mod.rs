//! # Persistent Storage
//!
//! The coverage store: one redb table mapping button sequences to the
//! frame they produced and an externally-requested flag.

mod redb_store;

pub use redb_store::{CoverageRecord, CoverageStats, CoverageStore, UpsertMode, UpsertOutcome};
