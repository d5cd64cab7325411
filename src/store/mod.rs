// file: src/store/mod.rs
// description: persistence trait over entities, scan history, and indicator records
// reference: internal module structure

mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::models::{Entity, EntityKind, IndicatorRecord};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Persistence boundary for the pipeline. All lookups used by identity
/// resolution live here so a database-backed implementation can swap in
/// without touching extraction or enrichment.
pub trait Store: Send + Sync {
    /// Resolves `text` against entity names and aliases. Actor matching is
    /// normalization-insensitive; countries match by name, case-insensitive.
    fn find_entity_by_name_or_alias(&self, kind: EntityKind, text: &str)
        -> Result<Option<Entity>>;

    /// Returns the existing entity for `name` or creates it with the given
    /// aliases. Creation assigns a fresh id.
    fn get_or_create_entity(
        &self,
        kind: EntityKind,
        name: &str,
        aliases: &[String],
    ) -> Result<Entity>;

    fn list_entities(&self, kind: EntityKind) -> Result<Vec<Entity>>;

    /// Scan timestamps for every processed URL starting with `url_prefix`.
    /// An empty prefix returns the full history.
    fn read_scan_history(&self, url_prefix: &str) -> Result<HashMap<String, DateTime<Utc>>>;

    /// Marks `urls` as processed now. Overwrites earlier timestamps.
    fn write_scan_history(&self, urls: &[String]) -> Result<()>;

    /// Upserts a canonical indicator record keyed by `(ioc_value, ioc_type)`.
    /// An existing record keeps its identity fields; source URLs, counters,
    /// and association lists are merged in.
    fn persist_indicator(&self, record: &IndicatorRecord) -> Result<()>;
}
