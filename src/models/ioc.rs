// file: src/models/ioc.rs
// description: indicator types, per-article findings, and canonical indicator records
// reference: threat intelligence ioc standards

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Article URL recorded when a finding carries an index outside the run's
/// link list. Keeps the record instead of failing the run.
pub const URL_NOT_FOUND: &str = "URL_NOT_FOUND";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IocType {
    Url,
    Domain,
    File,
    Ipv4,
    Email,
    Md5,
    Sha1,
    Sha256,
    Cve,
    AptMention,
    CountryMention,
}

impl IocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IocType::Url => "url",
            IocType::Domain => "domain",
            IocType::File => "file",
            IocType::Ipv4 => "ipv4",
            IocType::Email => "email",
            IocType::Md5 => "md5",
            IocType::Sha1 => "sha1",
            IocType::Sha256 => "sha256",
            IocType::Cve => "cve",
            IocType::AptMention => "apt_mention",
            IocType::CountryMention => "country_mention",
        }
    }

    /// Primary observables become canonical records; the rest are mentions
    /// that only ever enrich a primary.
    pub fn is_primary(&self) -> bool {
        matches!(
            self,
            IocType::Url
                | IocType::Domain
                | IocType::File
                | IocType::Ipv4
                | IocType::Email
                | IocType::Md5
                | IocType::Sha1
                | IocType::Sha256
        )
    }

    pub fn is_mention(&self) -> bool {
        !self.is_primary()
    }
}

/// A single accepted pattern match inside one article. Lives for one
/// extraction call; consumed by enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub value: String,
    pub ioc_type: IocType,
    /// Byte span in the normalized article text the match came from.
    pub span: (usize, usize),
    pub article_index: usize,
    pub context_snippet: String,
    /// Canonical form for actor mentions (surface alias resolved via the
    /// reference alias map); `None` for every other type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_value: Option<String>,
}

/// A secondary entity reference (CVE, country, actor) associated with a
/// canonical indicator record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_value: Option<String>,
    pub context_snippet: String,
    /// Entity id from the persistent store when identity resolution
    /// succeeded; `None` for unresolved mentions and CVEs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<u64>,
}

/// The durable output unit. `(ioc_value, ioc_type)` is the unique key; the
/// identity never changes after creation, only the associative lists and
/// counters grow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorRecord {
    pub ioc_value: String,
    pub ioc_type: IocType,
    pub discovery_timestamp: DateTime<Utc>,
    pub source_article_urls: BTreeSet<String>,
    pub first_seen_context_snippet: String,
    pub occurrence_count: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associated_cves: Vec<Mention>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associated_countries: Vec<Mention>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub associated_apts: Vec<Mention>,
}

impl IndicatorRecord {
    pub fn new(
        ioc_value: String,
        ioc_type: IocType,
        discovery_timestamp: DateTime<Utc>,
        source_url: String,
        first_seen_context_snippet: String,
    ) -> Self {
        let mut source_article_urls = BTreeSet::new();
        source_article_urls.insert(source_url);

        Self {
            ioc_value,
            ioc_type,
            discovery_timestamp,
            source_article_urls,
            first_seen_context_snippet,
            occurrence_count: 1,
            associated_cves: Vec::new(),
            associated_countries: Vec::new(),
            associated_apts: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_partition() {
        assert!(IocType::Domain.is_primary());
        assert!(IocType::Sha256.is_primary());
        assert!(!IocType::Cve.is_primary());
        assert!(IocType::AptMention.is_mention());
        assert!(IocType::CountryMention.is_mention());
    }

    #[test]
    fn test_type_serialization_names() {
        assert_eq!(
            serde_json::to_string(&IocType::AptMention).unwrap(),
            "\"apt_mention\""
        );
        assert_eq!(serde_json::to_string(&IocType::Ipv4).unwrap(), "\"ipv4\"");
    }

    #[test]
    fn test_empty_association_lists_are_omitted() {
        let record = IndicatorRecord::new(
            "evil.com".to_string(),
            IocType::Domain,
            Utc::now(),
            "http://example.com/a".to_string(),
            "...evil.com...".to_string(),
        );

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("associated_cves").is_none());
        assert!(json.get("associated_countries").is_none());
        assert!(json.get("associated_apts").is_none());
        assert_eq!(json["occurrence_count"], 1);
    }
}
