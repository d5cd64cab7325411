// file: src/store/memory.rs
// description: in-memory store implementation with JSON seed loading
// reference: std::sync::Mutex interior mutability

use crate::error::{CrawlError, Result};
use crate::models::{normalize_entity_name, Entity, EntityKind, IndicatorRecord, IocType, Mention};
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

#[derive(Debug, Deserialize)]
struct SeedEntity {
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    entities: Vec<Entity>,
    scan_history: HashMap<String, DateTime<Utc>>,
    indicators: HashMap<(String, IocType), IndicatorRecord>,
}

/// Single-process store. Holds everything behind one mutex; every trait
/// method is a short critical section with no I/O inside.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `actors.json` and `countries.json` from `settings_dir`. Either
    /// file may be absent; a malformed file is skipped with a warning.
    pub fn seed_from_dir(&self, settings_dir: &Path) -> Result<()> {
        self.seed_file(settings_dir.join("actors.json"), EntityKind::Actor)?;
        self.seed_file(settings_dir.join("countries.json"), EntityKind::Country)?;
        Ok(())
    }

    fn seed_file(&self, path: std::path::PathBuf, kind: EntityKind) -> Result<()> {
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not read seed file {}: {}", path.display(), e);
                return Ok(());
            }
        };
        let seeds: Vec<SeedEntity> = match serde_json::from_str(&raw) {
            Ok(seeds) => seeds,
            Err(e) => {
                warn!("Malformed seed file {}: {}", path.display(), e);
                return Ok(());
            }
        };
        for seed in seeds {
            self.get_or_create_entity(kind, &seed.name, &seed.aliases)?;
        }
        Ok(())
    }

    /// Snapshot of all persisted indicator records, in no particular order.
    pub fn indicators(&self) -> Result<Vec<IndicatorRecord>> {
        Ok(self.lock()?.indicators.values().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| CrawlError::Store("store mutex poisoned".to_string()))
    }
}

fn entity_matches(entity: &Entity, kind: EntityKind, text: &str) -> bool {
    if entity.kind != kind {
        return false;
    }
    match kind {
        EntityKind::Actor => {
            let wanted = normalize_entity_name(text);
            normalize_entity_name(&entity.name) == wanted
                || entity
                    .aliases
                    .iter()
                    .any(|a| normalize_entity_name(a) == wanted)
        }
        EntityKind::Country => {
            let wanted = text.to_lowercase();
            entity.name.to_lowercase() == wanted
                || entity.aliases.iter().any(|a| a.to_lowercase() == wanted)
        }
    }
}

fn merge_mentions(existing: &mut Vec<Mention>, incoming: &[Mention], ioc_type: IocType) {
    for mention in incoming {
        let duplicate = existing.iter().any(|m| match ioc_type {
            IocType::AptMention => {
                m.value == mention.value && m.normalized_value == mention.normalized_value
            }
            _ => m.value == mention.value,
        });
        if !duplicate {
            existing.push(mention.clone());
        }
    }
}

impl Store for MemoryStore {
    fn find_entity_by_name_or_alias(
        &self,
        kind: EntityKind,
        text: &str,
    ) -> Result<Option<Entity>> {
        let inner = self.lock()?;
        Ok(inner
            .entities
            .iter()
            .find(|e| entity_matches(e, kind, text))
            .cloned())
    }

    fn get_or_create_entity(
        &self,
        kind: EntityKind,
        name: &str,
        aliases: &[String],
    ) -> Result<Entity> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner
            .entities
            .iter()
            .find(|e| entity_matches(e, kind, name))
        {
            return Ok(existing.clone());
        }

        inner.next_id += 1;
        let entity = Entity {
            id: inner.next_id,
            kind,
            name: name.to_string(),
            aliases: aliases.to_vec(),
        };
        inner.entities.push(entity.clone());
        Ok(entity)
    }

    fn list_entities(&self, kind: EntityKind) -> Result<Vec<Entity>> {
        let inner = self.lock()?;
        Ok(inner
            .entities
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect())
    }

    fn read_scan_history(&self, url_prefix: &str) -> Result<HashMap<String, DateTime<Utc>>> {
        let inner = self.lock()?;
        Ok(inner
            .scan_history
            .iter()
            .filter(|(url, _)| url.starts_with(url_prefix))
            .map(|(url, ts)| (url.clone(), *ts))
            .collect())
    }

    fn write_scan_history(&self, urls: &[String]) -> Result<()> {
        let now = Utc::now();
        let mut inner = self.lock()?;
        for url in urls {
            inner.scan_history.insert(url.clone(), now);
        }
        Ok(())
    }

    fn persist_indicator(&self, record: &IndicatorRecord) -> Result<()> {
        let mut inner = self.lock()?;
        let key = (record.ioc_value.clone(), record.ioc_type);
        match inner.indicators.get_mut(&key) {
            Some(existing) => {
                existing
                    .source_article_urls
                    .extend(record.source_article_urls.iter().cloned());
                existing.occurrence_count += record.occurrence_count;
                merge_mentions(
                    &mut existing.associated_cves,
                    &record.associated_cves,
                    IocType::Cve,
                );
                merge_mentions(
                    &mut existing.associated_countries,
                    &record.associated_countries,
                    IocType::CountryMention,
                );
                merge_mentions(
                    &mut existing.associated_apts,
                    &record.associated_apts,
                    IocType::AptMention,
                );
            }
            None => {
                inner.indicators.insert(key, record.clone());
            }
        }
        Ok(())
    }
}
