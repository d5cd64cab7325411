// file: src/models/entity.rs
// description: reference entities (threat actors, countries) resolved against the store
// reference: entity identity resolution contract

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Actor,
    Country,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: u64,
    pub kind: EntityKind,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Normalization shared by actor identity resolution everywhere: the same
/// function must be applied to mention text and to stored names/aliases or
/// lookups silently diverge.
pub fn normalize_entity_name(name: &str) -> String {
    name.to_lowercase().replace(['-', ' '], "")
}
