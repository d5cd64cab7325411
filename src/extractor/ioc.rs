// file: src/extractor/ioc.rs
// description: pattern-driven indicator extraction with overlap resolution and filtering
// reference: src/extractor/patterns.rs and src/extractor/reference.rs

use crate::extractor::patterns::{self, full_match};
use crate::extractor::reference::ReferenceData;
use crate::extractor::refang::refang;
use crate::models::{Finding, IocType};
use crate::utils::text::{context_snippet, normalize_for_matching};
use regex::Regex;
use std::net::Ipv4Addr;

struct Candidate {
    start: usize,
    end: usize,
    raw: String,
    ioc_type: IocType,
}

/// Extracts findings from article text. Holds the reference data for the
/// whole run; `extract` is called once per article.
pub struct IocExtractor {
    reference: ReferenceData,
    context_window: usize,
}

impl IocExtractor {
    pub fn new(reference: ReferenceData, context_window: usize) -> Self {
        Self {
            reference,
            context_window,
        }
    }

    /// Runs every pattern over the normalized text, resolves overlapping
    /// matches, and filters the survivors. Findings carry spans into the
    /// normalized text, so enrichment must normalize the same way.
    pub fn extract(&self, text: &str, article_index: usize) -> Vec<Finding> {
        let normalized = normalize_for_matching(text);
        let mut candidates = self.collect_candidates(&normalized);

        // Earliest start wins; on a tie the longest match wins. Filtered-out
        // candidates do not reserve their span, so a whitelisted match never
        // shadows a real one underneath it.
        candidates.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut accepted_spans: Vec<(usize, usize)> = Vec::new();
        let mut findings = Vec::new();
        for candidate in candidates {
            let overlaps = accepted_spans
                .iter()
                .any(|&(s, e)| candidate.start < e && s < candidate.end);
            if overlaps {
                continue;
            }
            if let Some(finding) = self.filter_candidate(&candidate, &normalized, article_index) {
                accepted_spans.push((candidate.start, candidate.end));
                findings.push(finding);
            }
        }
        findings
    }

    fn collect_candidates(&self, text: &str) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        let fixed: [(&Regex, IocType); 8] = [
            (&patterns::URL, IocType::Url),
            (&patterns::EMAIL, IocType::Email),
            (&patterns::IPV4, IocType::Ipv4),
            (&patterns::DOMAIN, IocType::Domain),
            (&patterns::MD5, IocType::Md5),
            (&patterns::SHA1, IocType::Sha1),
            (&patterns::SHA256, IocType::Sha256),
            (&patterns::CVE, IocType::Cve),
        ];
        for (re, ioc_type) in fixed {
            for m in re.find_iter(text) {
                candidates.push(Candidate {
                    start: m.start(),
                    end: m.end(),
                    raw: m.as_str().to_string(),
                    ioc_type,
                });
            }
        }

        // The file pattern consumes a trailing delimiter; the filename itself
        // is capture group 1.
        for caps in patterns::FILE.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                candidates.push(Candidate {
                    start: m.start(),
                    end: m.end(),
                    raw: m.as_str().to_string(),
                    ioc_type: IocType::File,
                });
            }
        }

        let dynamic = [
            (&self.reference.actor_pattern, IocType::AptMention),
            (&self.reference.country_pattern, IocType::CountryMention),
        ];
        for (pattern, ioc_type) in dynamic {
            if let Some(re) = pattern {
                for m in re.find_iter(text) {
                    candidates.push(Candidate {
                        start: m.start(),
                        end: m.end(),
                        raw: m.as_str().to_string(),
                        ioc_type,
                    });
                }
            }
        }

        candidates
    }

    fn filter_candidate(
        &self,
        candidate: &Candidate,
        text: &str,
        article_index: usize,
    ) -> Option<Finding> {
        let snippet = context_snippet(text, candidate.start, candidate.end, self.context_window);

        let (value, ioc_type, normalized_value) = match candidate.ioc_type {
            IocType::Url | IocType::Domain | IocType::File => {
                let (ioc_type, value) = self.classify_network_candidate(&candidate.raw, &snippet)?;
                (value, ioc_type, None)
            }
            IocType::Ipv4 => {
                let value = refang(&candidate.raw, IocType::Ipv4);
                if self.reference.whitelisted_ips.contains(&value) {
                    return None;
                }
                let addr: Ipv4Addr = value.parse().ok()?;
                if is_excluded_ipv4(addr) {
                    return None;
                }
                if self.reference.context_is_blacklisted(&snippet) {
                    return None;
                }
                (value, IocType::Ipv4, None)
            }
            IocType::Email => {
                let value = refang(&candidate.raw, IocType::Email);
                if self.reference.whitelisted_emails.contains(&value.to_lowercase()) {
                    return None;
                }
                if self.reference.context_is_blacklisted(&snippet) {
                    return None;
                }
                (value, IocType::Email, None)
            }
            IocType::Md5 | IocType::Sha1 | IocType::Sha256 => {
                let value = refang(&candidate.raw, candidate.ioc_type);
                let whitelist = match candidate.ioc_type {
                    IocType::Md5 => &self.reference.whitelisted_md5,
                    IocType::Sha1 => &self.reference.whitelisted_sha1,
                    _ => &self.reference.whitelisted_sha256,
                };
                if whitelist.contains(&value.to_lowercase()) {
                    return None;
                }
                (value, candidate.ioc_type, None)
            }
            IocType::Cve => {
                let value = refang(&candidate.raw, IocType::Cve).to_uppercase();
                (value, IocType::Cve, None)
            }
            IocType::AptMention => {
                let canonical = self
                    .reference
                    .canonical_actor_name(&candidate.raw)
                    .unwrap_or(&candidate.raw)
                    .to_string();
                (candidate.raw.clone(), IocType::AptMention, Some(canonical))
            }
            IocType::CountryMention => (candidate.raw.clone(), IocType::CountryMention, None),
        };

        Some(Finding {
            value,
            ioc_type,
            span: (candidate.start, candidate.end),
            article_index,
            context_snippet: snippet,
            normalized_value,
        })
    }

    /// Classification hierarchy for the three network-shaped patterns that
    /// can match the same text: URL beats domain beats file. Each stage
    /// requires a full match of the refanged value against its own pattern.
    fn classify_network_candidate(&self, raw: &str, snippet: &str) -> Option<(IocType, String)> {
        let as_url = refang(raw, IocType::Url);
        if full_match(&patterns::URL, &as_url) {
            if let Ok(parsed) = url::Url::parse(&as_url) {
                if let Some(host) = parsed.host_str() {
                    if self
                        .reference
                        .whitelisted_domains
                        .contains(&host.to_lowercase())
                    {
                        return None;
                    }
                }
            }
            if self.reference.context_is_blacklisted(snippet) {
                return None;
            }
            return Some((IocType::Url, as_url));
        }

        let as_domain = refang(raw, IocType::Domain);
        if full_match(&patterns::DOMAIN, &as_domain) {
            let lowered = as_domain.to_lowercase();
            let tld = lowered.rsplit('.').next().unwrap_or_default();
            if self.reference.valid_tlds.contains(tld) {
                // Whitelist and context hits suppress the candidate outright.
                if self.reference.whitelisted_domains.contains(&lowered)
                    || self.reference.context_is_blacklisted(snippet)
                {
                    return None;
                }
                return Some((IocType::Domain, as_domain));
            }
            // Unknown TLD: filenames are domain-shaped (stage2.dll), so the
            // candidate falls through to the file check instead of dropping.
        }

        let as_file = refang(raw, IocType::File);
        if full_match(&patterns::FILE, &as_file) {
            if self
                .reference
                .whitelisted_files
                .contains(&as_file.to_lowercase())
                || self.reference.context_is_blacklisted(snippet)
            {
                return None;
            }
            return Some((IocType::File, as_file));
        }

        None
    }
}

/// Addresses that never appear as real infrastructure: RFC 1918 private
/// space, loopback, link-local, unspecified, broadcast, documentation
/// blocks, and the 240.0.0.0/4 reserved range.
fn is_excluded_ipv4(addr: Ipv4Addr) -> bool {
    addr.is_private()
        || addr.is_loopback()
        || addr.is_unspecified()
        || addr.is_link_local()
        || addr.is_broadcast()
        || addr.is_documentation()
        || addr.octets()[0] >= 240
}
