// file: src/enrichment/engine.rs
// description: aggregates per-article findings into canonical indicator records with proximity association
// reference: src/extractor/ioc.rs findings and the store entity contract

use crate::error::Result;
use crate::models::{
    EntityKind, Finding, IndicatorRecord, IocType, Mention, URL_NOT_FOUND,
};
use crate::store::Store;
use crate::utils::text::{ceil_char_boundary, floor_char_boundary, normalize_for_matching};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

/// Per-record state while the run accumulates. The seen-sets never leave
/// this builder; only the record itself is returned.
struct RecordBuilder {
    record: IndicatorRecord,
    seen_cves: HashSet<String>,
    seen_countries: HashSet<String>,
    seen_apts: HashSet<(String, String)>,
}

impl RecordBuilder {
    fn new(record: IndicatorRecord) -> Self {
        Self {
            record,
            seen_cves: HashSet::new(),
            seen_countries: HashSet::new(),
            seen_apts: HashSet::new(),
        }
    }
}

pub struct EnrichmentEngine<'a> {
    store: &'a dyn Store,
    proximity_window: usize,
}

impl<'a> EnrichmentEngine<'a> {
    pub fn new(store: &'a dyn Store, proximity_window: usize) -> Self {
        Self {
            store,
            proximity_window,
        }
    }

    /// Single aggregation pass over every finding of the run. Records come
    /// back in first-observation order; a record's identity fields are set
    /// once and never overwritten by later sightings.
    pub fn process(
        &self,
        findings: &[Finding],
        article_urls: &[String],
        article_texts: &HashMap<usize, String>,
    ) -> Result<Vec<IndicatorRecord>> {
        let now = Utc::now();
        let mut builders: HashMap<(String, IocType), RecordBuilder> = HashMap::new();
        let mut order: Vec<(String, IocType)> = Vec::new();

        let mut by_article: BTreeMap<usize, Vec<&Finding>> = BTreeMap::new();
        for finding in findings {
            by_article.entry(finding.article_index).or_default().push(finding);
        }

        for (article_index, article_findings) in by_article {
            let article_url = match article_urls.get(article_index) {
                Some(url) => url.clone(),
                None => {
                    warn!(
                        "Finding references unknown article index {}; recording without source URL",
                        article_index
                    );
                    URL_NOT_FOUND.to_string()
                }
            };
            // Spans refer to text normalized the same way extraction did.
            let normalized_text = article_texts
                .get(&article_index)
                .map(|t| normalize_for_matching(t))
                .unwrap_or_default();

            let (primaries, mentions): (Vec<&Finding>, Vec<&Finding>) = article_findings
                .into_iter()
                .partition(|f| f.ioc_type.is_primary());

            for primary in primaries {
                let key = self.observe_primary(&mut builders, &mut order, primary, &article_url, now);
                let nearby =
                    self.mentions_near_primary(primary, &mentions, &normalized_text);
                if let Some(builder) = builders.get_mut(&key) {
                    for mention in nearby {
                        self.associate_mention(builder, mention)?;
                    }
                }
            }
        }

        Ok(order
            .into_iter()
            .filter_map(|key| builders.remove(&key).map(|b| b.record))
            .collect())
    }

    fn observe_primary(
        &self,
        builders: &mut HashMap<(String, IocType), RecordBuilder>,
        order: &mut Vec<(String, IocType)>,
        finding: &Finding,
        article_url: &str,
        now: DateTime<Utc>,
    ) -> (String, IocType) {
        // Case carries information for files and hashes; only hostname-like
        // types fold case for identity.
        let normalized_value = match finding.ioc_type {
            IocType::Domain | IocType::Email => finding.value.to_lowercase(),
            _ => finding.value.clone(),
        };
        let key = (normalized_value.clone(), finding.ioc_type);

        match builders.get_mut(&key) {
            Some(builder) => {
                builder.record.occurrence_count += 1;
                builder
                    .record
                    .source_article_urls
                    .insert(article_url.to_string());
            }
            None => {
                let record = IndicatorRecord::new(
                    normalized_value,
                    finding.ioc_type,
                    now,
                    article_url.to_string(),
                    finding.context_snippet.clone(),
                );
                builders.insert(key.clone(), RecordBuilder::new(record));
                order.push(key.clone());
            }
        }
        key
    }

    /// Mentions whose surface text appears within the proximity window of
    /// any occurrence of the primary's surface text. Windowing over literal
    /// occurrences keeps multi-topic articles from over-associating.
    fn mentions_near_primary<'f>(
        &self,
        primary: &Finding,
        mentions: &[&'f Finding],
        text: &str,
    ) -> Vec<&'f Finding> {
        if mentions.is_empty() || text.is_empty() {
            return Vec::new();
        }
        let (start, end) = primary.span;
        let Some(primary_surface) = text.get(start..end) else {
            return Vec::new();
        };

        let mut nearby = Vec::new();
        let mut seen: HashSet<usize> = HashSet::new();
        for (occurrence, _) in text.match_indices(primary_surface) {
            let from = floor_char_boundary(text, occurrence.saturating_sub(self.proximity_window));
            let to = ceil_char_boundary(
                text,
                (occurrence + primary_surface.len() + self.proximity_window).min(text.len()),
            );
            let window = &text[from..to];
            for (idx, mention) in mentions.iter().enumerate() {
                if seen.contains(&idx) {
                    continue;
                }
                let Some(mention_surface) = text.get(mention.span.0..mention.span.1) else {
                    continue;
                };
                if window.contains(mention_surface) {
                    seen.insert(idx);
                    nearby.push(*mention);
                }
            }
        }
        nearby
    }

    fn associate_mention(&self, builder: &mut RecordBuilder, finding: &Finding) -> Result<()> {
        match finding.ioc_type {
            IocType::Cve => {
                if builder.seen_cves.insert(finding.value.clone()) {
                    builder.record.associated_cves.push(Mention {
                        value: finding.value.clone(),
                        normalized_value: None,
                        context_snippet: finding.context_snippet.clone(),
                        entity_id: None,
                    });
                }
            }
            IocType::CountryMention => {
                if !builder.seen_countries.insert(finding.value.clone()) {
                    return Ok(());
                }
                let mention = match self
                    .store
                    .find_entity_by_name_or_alias(EntityKind::Country, &finding.value)
                {
                    Ok(Some(entity)) => Mention {
                        value: finding.value.clone(),
                        normalized_value: Some(entity.name),
                        context_snippet: finding.context_snippet.clone(),
                        entity_id: Some(entity.id),
                    },
                    // Unresolved countries stay as bare mentions.
                    Ok(None) => Mention {
                        value: finding.value.clone(),
                        normalized_value: None,
                        context_snippet: finding.context_snippet.clone(),
                        entity_id: None,
                    },
                    Err(e) => {
                        warn!("Country lookup failed for {}: {}", finding.value, e);
                        return Ok(());
                    }
                };
                builder.record.associated_countries.push(mention);
            }
            IocType::AptMention => {
                let normalized = finding
                    .normalized_value
                    .clone()
                    .unwrap_or_else(|| finding.value.clone());
                let dedup_key = (finding.value.clone(), normalized.clone());
                if !builder.seen_apts.insert(dedup_key) {
                    return Ok(());
                }
                let entity = match self
                    .store
                    .find_entity_by_name_or_alias(EntityKind::Actor, &normalized)
                {
                    Ok(Some(entity)) => entity,
                    // Unknown-but-seen actors are created on first sight so
                    // later runs resolve them and accumulate aliases.
                    Ok(None) => match self.store.get_or_create_entity(
                        EntityKind::Actor,
                        &normalized,
                        &[finding.value.clone()],
                    ) {
                        Ok(entity) => entity,
                        Err(e) => {
                            warn!("Actor creation failed for {}: {}", normalized, e);
                            return Ok(());
                        }
                    },
                    Err(e) => {
                        warn!("Actor lookup failed for {}: {}", normalized, e);
                        return Ok(());
                    }
                };
                builder.record.associated_apts.push(Mention {
                    value: finding.value.clone(),
                    normalized_value: Some(normalized),
                    context_snippet: finding.context_snippet.clone(),
                    entity_id: Some(entity.id),
                });
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::patterns::build_alternation_pattern;
    use crate::extractor::{IocExtractor, ReferenceData};
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn test_reference() -> ReferenceData {
        let mut actor_name_map = HashMap::new();
        actor_name_map.insert("apt28".to_string(), "APT28".to_string());
        actor_name_map.insert("apt 28".to_string(), "APT28".to_string());
        actor_name_map.insert("fancy bear".to_string(), "APT28".to_string());

        ReferenceData {
            whitelisted_domains: HashSet::new(),
            whitelisted_ips: HashSet::new(),
            whitelisted_files: HashSet::new(),
            whitelisted_emails: HashSet::new(),
            whitelisted_md5: HashSet::new(),
            whitelisted_sha1: HashSet::new(),
            whitelisted_sha256: HashSet::new(),
            negative_keywords: Vec::new(),
            valid_tlds: ["com", "net", "ru"].into_iter().map(str::to_string).collect(),
            actor_pattern: build_alternation_pattern(&[
                "APT28".to_string(),
                "APT 28".to_string(),
                "Fancy Bear".to_string(),
            ]),
            actor_name_map,
            country_pattern: build_alternation_pattern(&["Russia".to_string()]),
        }
    }

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .get_or_create_entity(
                EntityKind::Actor,
                "APT28",
                &["Fancy Bear".to_string()],
            )
            .unwrap();
        store
            .get_or_create_entity(EntityKind::Country, "Russia", &[])
            .unwrap();
        store
    }

    fn run_pipeline(
        store: &MemoryStore,
        articles: &[(&str, &str)],
        window: usize,
    ) -> Vec<IndicatorRecord> {
        let extractor = IocExtractor::new(test_reference(), 50);
        let mut findings = Vec::new();
        let mut urls = Vec::new();
        let mut texts = HashMap::new();
        for (idx, (url, text)) in articles.iter().enumerate() {
            findings.extend(extractor.extract(text, idx));
            urls.push(url.to_string());
            texts.insert(idx, text.to_string());
        }
        EnrichmentEngine::new(store, window)
            .process(&findings, &urls, &texts)
            .unwrap()
    }

    #[test]
    fn test_case_variants_merge_into_one_domain_record() {
        let store = seeded_store();
        let records = run_pipeline(
            &store,
            &[
                ("https://b.example/two", "campaign beacons to EVIL.COM daily"),
                ("https://a.example/one", "the host evil.com served the payload"),
            ],
            250,
        );

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.ioc_value, "evil.com");
        assert_eq!(record.ioc_type, IocType::Domain);
        assert_eq!(record.occurrence_count, 2);
        let urls: Vec<&String> = record.source_article_urls.iter().collect();
        assert_eq!(urls, vec!["https://a.example/one", "https://b.example/two"]);
        // First observation fixes the context snippet.
        assert!(record.first_seen_context_snippet.contains("EVIL.COM"));
    }

    #[test]
    fn test_proximity_limits_association() {
        let filler = "benign filler text about patch schedules. ".repeat(12);
        let text = format!(
            "The implant at evil.com exploited CVE-2024-1111 on arrival. {filler} Separately, admins should review CVE-2024-2222 guidance."
        );
        let store = seeded_store();
        let records = run_pipeline(&store, &[("https://a.example/one", &text)], 100);

        let domain = records
            .iter()
            .find(|r| r.ioc_type == IocType::Domain)
            .unwrap();
        let cves: Vec<&str> = domain
            .associated_cves
            .iter()
            .map(|m| m.value.as_str())
            .collect();
        assert_eq!(cves, vec!["CVE-2024-1111"]);
    }

    #[test]
    fn test_unknown_actor_is_created_in_store() {
        let store = seeded_store();
        let extractor = IocExtractor::new(test_reference(), 50);

        // Hand-built mention for an actor missing from the store.
        let text = "traffic to evil.net traced back to operators";
        let mut findings = extractor.extract(text, 0);
        let normalized = normalize_for_matching(text);
        let pos = normalized.find("operators").unwrap();
        findings.push(Finding {
            value: "Shadow-Cartel".to_string(),
            ioc_type: IocType::AptMention,
            span: (pos, pos + "operators".len()),
            article_index: 0,
            context_snippet: "...operators...".to_string(),
            normalized_value: Some("ShadowCartel".to_string()),
        });

        let mut texts = HashMap::new();
        texts.insert(0, text.to_string());
        let records = EnrichmentEngine::new(&store, 250)
            .process(&findings, &["https://a.example/one".to_string()], &texts)
            .unwrap();

        let domain = records
            .iter()
            .find(|r| r.ioc_type == IocType::Domain)
            .unwrap();
        assert_eq!(domain.associated_apts.len(), 1);
        assert!(domain.associated_apts[0].entity_id.is_some());

        let created = store
            .find_entity_by_name_or_alias(EntityKind::Actor, "ShadowCartel")
            .unwrap()
            .unwrap();
        assert_eq!(created.aliases, vec!["Shadow-Cartel".to_string()]);
    }

    #[test]
    fn test_unknown_article_index_uses_sentinel_url() {
        let store = seeded_store();
        let findings = vec![Finding {
            value: "evil.com".to_string(),
            ioc_type: IocType::Domain,
            span: (0, 8),
            article_index: 9,
            context_snippet: "...evil.com...".to_string(),
            normalized_value: None,
        }];

        let records = EnrichmentEngine::new(&store, 250)
            .process(&findings, &[], &HashMap::new())
            .unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].source_article_urls.contains(URL_NOT_FOUND));
    }

    #[test]
    fn test_full_scenario_attribution() {
        let text = "C2 at 45.133.1.4, domain evil[.]com, exploiting CVE-2024-1234, \
                    attributed to APT28 also known as Fancy Bear operating from Russia.";
        let store = seeded_store();
        let records = run_pipeline(&store, &[("https://a.example/report", text)], 250);

        let ipv4 = records.iter().find(|r| r.ioc_type == IocType::Ipv4).unwrap();
        let domain = records
            .iter()
            .find(|r| r.ioc_type == IocType::Domain)
            .unwrap();
        assert_eq!(ipv4.ioc_value, "45.133.1.4");
        assert_eq!(domain.ioc_value, "evil.com");

        for record in [ipv4, domain] {
            let cves: Vec<&str> = record
                .associated_cves
                .iter()
                .map(|m| m.value.as_str())
                .collect();
            assert_eq!(cves, vec!["CVE-2024-1234"]);

            // Both surface aliases survive; both normalize to the canonical name.
            let apts: Vec<(&str, Option<&str>)> = record
                .associated_apts
                .iter()
                .map(|m| (m.value.as_str(), m.normalized_value.as_deref()))
                .collect();
            assert_eq!(
                apts,
                vec![("APT28", Some("APT28")), ("Fancy Bear", Some("APT28"))]
            );

            assert_eq!(record.associated_countries.len(), 1);
            assert_eq!(record.associated_countries[0].value, "Russia");
            assert!(record.associated_countries[0].entity_id.is_some());
        }
    }

    #[test]
    fn test_duplicate_mentions_dedup_first_seen_wins() {
        let text = "evil.com used CVE-2024-1234 and again CVE-2024-1234 nearby.";
        let store = seeded_store();
        let records = run_pipeline(&store, &[("https://a.example/one", text)], 250);

        let domain = records
            .iter()
            .find(|r| r.ioc_type == IocType::Domain)
            .unwrap();
        assert_eq!(domain.associated_cves.len(), 1);
    }
}
