//! Persistence layer: one module per entity group, each exposing
//! prepared-statement operations over the SQLite schema in `migrations/`.
//!
//! Every write-side operation returns a tagged outcome rather than relying
//! on callers to distinguish success states by inspecting row counts.

pub mod centers;
pub mod companies;
pub mod flags;
pub mod offices;
pub mod refresh_state;

/// Outcome of an upsert keyed on a natural/unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Outcome of inserting a company row with `ON CONFLICT DO NOTHING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Skipped,
}
