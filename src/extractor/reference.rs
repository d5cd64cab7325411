// file: src/extractor/reference.rs
// description: reference data (whitelists, negative keywords, TLDs, entity patterns) loaded at startup
// reference: settings/*.json and the persistent entity store

use crate::error::Result;
use crate::extractor::patterns::build_alternation_pattern;
use crate::models::EntityKind;
use crate::store::Store;
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::warn;

lazy_static! {
    // "APT28" also appears in prose as "APT 28"; the spaced variant is
    // generated so both surfaces resolve to the same canonical name.
    static ref LETTERS_THEN_DIGITS: Regex =
        Regex::new(r"^([A-Za-z]+)(\d+)$").expect("LETTERS_THEN_DIGITS regex is valid");
}

#[derive(Debug, Default, Deserialize)]
struct WhitelistFile {
    #[serde(default)]
    domains: Vec<String>,
    #[serde(default)]
    ips: Vec<String>,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    emails: Vec<String>,
    #[serde(default)]
    md5: Vec<String>,
    #[serde(default)]
    sha1: Vec<String>,
    #[serde(default)]
    sha256: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContextBlacklistFile {
    #[serde(default)]
    negative_keywords: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TldFile {
    #[serde(default)]
    tlds: Vec<String>,
}

/// Everything the extractor consults besides the fixed patterns. Built once
/// per run; read-only afterwards.
pub struct ReferenceData {
    pub whitelisted_domains: HashSet<String>,
    pub whitelisted_ips: HashSet<String>,
    pub whitelisted_files: HashSet<String>,
    pub whitelisted_emails: HashSet<String>,
    pub whitelisted_md5: HashSet<String>,
    pub whitelisted_sha1: HashSet<String>,
    pub whitelisted_sha256: HashSet<String>,
    /// Word-bounded patterns over phrases that mark a benign context.
    pub negative_keywords: Vec<Regex>,
    pub valid_tlds: HashSet<String>,
    /// `None` when no actors are known; treated as never matching.
    pub actor_pattern: Option<Regex>,
    /// Lowercased surface form to canonical actor name.
    pub actor_name_map: HashMap<String, String>,
    pub country_pattern: Option<Regex>,
}

impl ReferenceData {
    /// Loads reference files from `settings_dir` and entity names from the
    /// store. A missing or malformed settings file degrades to empty data
    /// with a warning rather than failing the run.
    pub fn load(settings_dir: &Path, store: &dyn Store) -> Result<Self> {
        let whitelist: WhitelistFile = read_settings_file(settings_dir, "whitelist.json");
        let blacklist: ContextBlacklistFile =
            read_settings_file(settings_dir, "context_blacklist.json");
        let tld_file: TldFile = read_settings_file(settings_dir, "tlds.json");

        let negative_keywords = blacklist
            .negative_keywords
            .iter()
            .filter(|k| !k.trim().is_empty())
            .filter_map(|k| {
                RegexBuilder::new(&format!(r"\b{}\b", regex::escape(k)))
                    .case_insensitive(true)
                    .build()
                    .ok()
            })
            .collect();

        let mut actor_surfaces = Vec::new();
        let mut actor_name_map = HashMap::new();
        for actor in store.list_entities(EntityKind::Actor)? {
            for surface in std::iter::once(&actor.name).chain(actor.aliases.iter()) {
                add_actor_surface(surface, &actor.name, &mut actor_surfaces, &mut actor_name_map);
            }
        }

        let country_names: Vec<String> = store
            .list_entities(EntityKind::Country)?
            .into_iter()
            .map(|c| c.name)
            .collect();

        Ok(Self {
            whitelisted_domains: to_lower_set(whitelist.domains),
            whitelisted_ips: whitelist.ips.into_iter().collect(),
            whitelisted_files: to_lower_set(whitelist.files),
            whitelisted_emails: to_lower_set(whitelist.emails),
            whitelisted_md5: to_lower_set(whitelist.md5),
            whitelisted_sha1: to_lower_set(whitelist.sha1),
            whitelisted_sha256: to_lower_set(whitelist.sha256),
            negative_keywords,
            valid_tlds: to_lower_set(tld_file.tlds),
            actor_pattern: build_alternation_pattern(&actor_surfaces),
            actor_name_map,
            country_pattern: build_alternation_pattern(&country_names),
        })
    }

    /// Whether any benign-context phrase appears in the snippet.
    pub fn context_is_blacklisted(&self, snippet: &str) -> bool {
        self.negative_keywords.iter().any(|re| re.is_match(snippet))
    }

    /// Canonical actor name for a surface form, when known.
    pub fn canonical_actor_name(&self, surface: &str) -> Option<&str> {
        self.actor_name_map
            .get(&surface.to_lowercase())
            .map(String::as_str)
    }
}

fn add_actor_surface(
    surface: &str,
    canonical: &str,
    surfaces: &mut Vec<String>,
    name_map: &mut HashMap<String, String>,
) {
    let surface = surface.trim();
    if surface.is_empty() {
        return;
    }
    surfaces.push(surface.to_string());
    name_map.insert(surface.to_lowercase(), canonical.to_string());

    if let Some(caps) = LETTERS_THEN_DIGITS.captures(surface) {
        let spaced = format!("{} {}", &caps[1], &caps[2]);
        name_map.insert(spaced.to_lowercase(), canonical.to_string());
        surfaces.push(spaced);
    }
}

fn read_settings_file<T: Default + for<'de> Deserialize<'de>>(dir: &Path, file: &str) -> T {
    let path = dir.join(file);
    match std::fs::read_to_string(&path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Malformed settings file {}: {}", path.display(), e);
                T::default()
            }
        },
        Err(e) => {
            warn!("Could not read settings file {}: {}", path.display(), e);
            T::default()
        }
    }
}

fn to_lower_set(values: Vec<String>) -> HashSet<String> {
    values.into_iter().map(|v| v.to_lowercase()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .get_or_create_entity(
                EntityKind::Actor,
                "APT28",
                &["Fancy Bear".to_string(), "Sofacy".to_string()],
            )
            .unwrap();
        store
            .get_or_create_entity(EntityKind::Country, "Russia", &[])
            .unwrap();
        store
    }

    fn write_settings(dir: &Path) {
        fs::write(
            dir.join("whitelist.json"),
            r#"{"domains": ["Google.com"], "ips": ["8.8.8.8"], "files": ["robots.txt"]}"#,
        )
        .unwrap();
        fs::write(
            dir.join("context_blacklist.json"),
            r#"{"negative_keywords": ["for example"]}"#,
        )
        .unwrap();
        fs::write(dir.join("tlds.json"), r#"{"tlds": ["COM", "net"]}"#).unwrap();
    }

    #[test]
    fn test_load_lowercases_whitelists_and_tlds() {
        let dir = tempdir().unwrap();
        write_settings(dir.path());
        let store = seeded_store();

        let reference = ReferenceData::load(dir.path(), &store).unwrap();
        assert!(reference.whitelisted_domains.contains("google.com"));
        assert!(reference.valid_tlds.contains("com"));
        assert!(reference.valid_tlds.contains("net"));
    }

    #[test]
    fn test_missing_files_degrade_to_empty() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new();

        let reference = ReferenceData::load(dir.path(), &store).unwrap();
        assert!(reference.whitelisted_domains.is_empty());
        assert!(reference.negative_keywords.is_empty());
        assert!(reference.actor_pattern.is_none());
        assert!(reference.country_pattern.is_none());
    }

    #[test]
    fn test_context_blacklist_is_word_bounded() {
        let dir = tempdir().unwrap();
        write_settings(dir.path());
        let reference = ReferenceData::load(dir.path(), &seeded_store()).unwrap();

        assert!(reference.context_is_blacklisted("shown here for example only"));
        assert!(reference.context_is_blacklisted("For Example, this one"));
        assert!(!reference.context_is_blacklisted("before-examples text"));
    }

    #[test]
    fn test_actor_alias_resolution() {
        let dir = tempdir().unwrap();
        write_settings(dir.path());
        let reference = ReferenceData::load(dir.path(), &seeded_store()).unwrap();

        assert_eq!(reference.canonical_actor_name("fancy bear"), Some("APT28"));
        assert_eq!(reference.canonical_actor_name("SOFACY"), Some("APT28"));
        // Spaced variant generated from the letters+digits canonical name.
        assert_eq!(reference.canonical_actor_name("apt 28"), Some("APT28"));
        assert_eq!(reference.canonical_actor_name("turla"), None);
    }

    #[test]
    fn test_actor_pattern_matches_aliases() {
        let dir = tempdir().unwrap();
        write_settings(dir.path());
        let reference = ReferenceData::load(dir.path(), &seeded_store()).unwrap();

        let pattern = reference.actor_pattern.as_ref().unwrap();
        assert!(pattern.is_match("attributed to Fancy Bear operators"));
        assert!(pattern.is_match("the APT 28 campaign"));
        assert!(!pattern.is_match("an unrelated bear sighting"));
    }
}
