// file: src/crawler/link_finder.rs
// description: per-source article link discovery, heuristic scoring, and rescan filtering
// reference: https://docs.rs/feed-rs and https://docs.rs/scraper

use crate::crawler::http::HttpClient;
use crate::error::{CrawlError, Result};
use chrono::{DateTime, Duration, Utc};
use futures::{stream, StreamExt};
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};
use url::Url;

lazy_static! {
    static ref DATE_PATH: Regex = Regex::new(r"/\d{4}/\d{2}/").expect("DATE_PATH regex is valid");
}

/// Containers most likely to hold the article list, tried in order before
/// falling back to every anchor on the page.
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    "div#main-col",
    "div.bc_latest_news",
    "div#content",
    "div.content",
    "div#main",
    "div.main-content",
    "div.posts",
    "div.body-post",
    "section.post-content",
    "a.story-link",
];

/// Path substrings that mark navigation, account, or promo pages.
const INTERNAL_BLACKLIST: &[&str] = &[
    "/search",
    "/tag/",
    "/author/",
    "/login",
    "/signup",
    "/forums",
    "/forum/",
    "/legal/",
    "/glossary/",
    "/news-tip/",
    "mailto:",
    "tel:",
    "/about",
    "/offer/",
    "/deals/",
    "/deals",
    "/categories",
];

pub struct LinkFinder {
    client: HttpClient,
    blacklist_keywords: Vec<String>,
    score_threshold: u32,
    workers: usize,
}

impl LinkFinder {
    pub fn new(
        client: HttpClient,
        blacklist_keywords: Vec<String>,
        score_threshold: u32,
        workers: usize,
    ) -> Self {
        let blacklist_keywords = blacklist_keywords
            .into_iter()
            .map(|k| k.to_lowercase())
            .collect();
        Self {
            client,
            blacklist_keywords,
            score_threshold,
            workers,
        }
    }

    /// Discovers article links across all sources in parallel. The result is
    /// deduplicated and sorted so article indices are stable within a run.
    pub async fn discover(&self, sources: &[String]) -> Vec<String> {
        let results: Vec<Vec<String>> = stream::iter(sources)
            .map(|source| async move {
                match self.discover_source(source).await {
                    Ok(links) => {
                        info!("Source {} yielded {} links", source, links.len());
                        links
                    }
                    Err(e) => {
                        warn!("Source {} failed: {}", source, e);
                        Vec::new()
                    }
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let unique: BTreeSet<String> = results.into_iter().flatten().collect();
        unique.into_iter().collect()
    }

    async fn discover_source(&self, source: &str) -> Result<Vec<String>> {
        // A failed source simply yields zero links this run; retries with
        // backoff are reserved for article fetches.
        let body = self.client.get_text(source).await?;

        // Feed entries are assumed pre-filtered to articles; only fall back
        // to HTML heuristics when the source is not a feed.
        if let Some(links) = parse_feed_links(&body) {
            return Ok(links);
        }

        let source_url = Url::parse(source)
            .map_err(|e| CrawlError::Validation(format!("bad source URL {source}: {e}")))?;
        Ok(self.extract_html_links(&source_url, &body))
    }

    /// Anchors from the densest content containers, filtered and scored.
    pub fn extract_html_links(&self, source: &Url, body: &str) -> Vec<String> {
        let document = Html::parse_document(body);
        let anchor_selector = Selector::parse("a").expect("anchor selector is valid");

        let mut anchors: Vec<(String, String)> = Vec::new();
        for selector in CONTENT_SELECTORS {
            let Ok(parsed) = Selector::parse(selector) else {
                continue;
            };
            for container in document.select(&parsed) {
                if container.value().name() == "a" {
                    push_anchor(&mut anchors, &container);
                } else {
                    for anchor in container.select(&anchor_selector) {
                        push_anchor(&mut anchors, &anchor);
                    }
                }
            }
            if !anchors.is_empty() {
                break;
            }
        }
        if anchors.is_empty() {
            for anchor in document.select(&anchor_selector) {
                push_anchor(&mut anchors, &anchor);
            }
        }

        let mut accepted = Vec::new();
        for (href, text) in anchors {
            if let Some(link) = self.evaluate_anchor(source, &href, &text) {
                accepted.push(link);
            }
        }
        accepted
    }

    fn evaluate_anchor(&self, source: &Url, href: &str, text: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href == "#" || href == "/" {
            return None;
        }

        let resolved = source.join(href).ok()?;
        if resolved.host_str() != source.host_str() {
            return None;
        }
        if resolved.fragment().is_some() {
            return None;
        }
        let path = resolved.path();
        if path.is_empty() || path == "/" || text.trim().is_empty() {
            return None;
        }

        let lowered = resolved.as_str().to_lowercase();
        let blacklisted = INTERNAL_BLACKLIST
            .iter()
            .any(|kw| lowered.contains(kw))
            || self.blacklist_keywords.iter().any(|kw| lowered.contains(kw));
        if blacklisted {
            return None;
        }

        let score = score_candidate(text, &resolved);
        if score >= self.score_threshold {
            Some(resolved.to_string())
        } else {
            debug!("Rejected {} with score {}", resolved, score);
            None
        }
    }
}

fn push_anchor(anchors: &mut Vec<(String, String)>, element: &scraper::ElementRef<'_>) {
    if let Some(href) = element.value().attr("href") {
        let text = element.text().collect::<String>();
        anchors.push((href.to_string(), text));
    }
}

/// Extracts entry links if `body` parses as a feed with at least one linked
/// entry; `None` sends the caller down the HTML path.
pub fn parse_feed_links(body: &str) -> Option<Vec<String>> {
    let feed = feed_rs::parser::parse(body.as_bytes()).ok()?;
    let links: Vec<String> = feed
        .entries
        .iter()
        .filter_map(|entry| entry.links.first().map(|l| l.href.clone()))
        .collect();
    if links.is_empty() {
        None
    } else {
        Some(links)
    }
}

/// Additive heuristics; no single signal is required, any combination that
/// reaches the threshold qualifies the link.
pub fn score_candidate(text: &str, link: &Url) -> u32 {
    let mut score = 0;

    let words = text.split_whitespace().count();
    if words >= 4 {
        score += 2;
    } else if words == 3 {
        score += 1;
    }

    let path = link.path();
    let segments = path.split('/').filter(|s| !s.is_empty()).count();
    if segments >= 3 {
        score += 1;
    }
    if DATE_PATH.is_match(path) || path.ends_with(".html") || path.ends_with(".htm") {
        score += 1;
    }
    if !path.ends_with('/') {
        score += 1;
    }

    score
}

/// Keeps links that were never scanned, or whose last scan is older than
/// `rescan_after`. History timestamps are UTC.
pub fn filter_links_by_history(
    links: Vec<String>,
    history: &HashMap<String, DateTime<Utc>>,
    rescan_after: Duration,
) -> Vec<String> {
    let now = Utc::now();
    links
        .into_iter()
        .filter(|link| match history.get(link) {
            Some(last_scanned) => now - *last_scanned > rescan_after,
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration as StdDuration;

    fn finder() -> LinkFinder {
        let client = HttpClient::new(StdDuration::from_secs(5), 1, StdDuration::from_secs(1))
            .unwrap();
        LinkFinder::new(client, vec!["webinar".to_string()], 3, 4)
    }

    #[test]
    fn test_score_rewards_long_titles_and_deep_paths() {
        let link = Url::parse("https://news.example/2024/05/big-ransomware-wave.html").unwrap();
        // 4+ words (+2), 3 segments (+1), date path (+1), no trailing slash (+1).
        assert_eq!(score_candidate("Big ransomware wave hits hospitals", &link), 5);
    }

    #[test]
    fn test_score_short_title_shallow_path() {
        let link = Url::parse("https://news.example/contact/").unwrap();
        assert_eq!(score_candidate("Contact", &link), 0);
    }

    #[test]
    fn test_extract_rejects_cross_domain_and_blacklisted() {
        let html = r#"
            <article>
              <a href="/2024/05/apt-campaign-targets-banks.html">New APT campaign targets European banks</a>
              <a href="https://other.example/2024/05/story.html">Story on another site entirely here</a>
              <a href="/tag/ransomware">Ransomware coverage and more tagged posts</a>
              <a href="/2024/05/webinar-signup.html">Join our big security webinar today</a>
              <a href="/2024/05/fragment.html#comments">Deep dive into the loader internals</a>
            </article>
        "#;
        let source = Url::parse("https://news.example/").unwrap();
        let links = finder().extract_html_links(&source, html);
        assert_eq!(
            links,
            vec!["https://news.example/2024/05/apt-campaign-targets-banks.html"]
        );
    }

    #[test]
    fn test_extract_falls_back_to_all_anchors() {
        let html = r#"
            <div class="unknown-layout">
              <a href="/2024/06/stealer-campaign-analysis.html">Stealer campaign analysis and infrastructure</a>
            </div>
        "#;
        let source = Url::parse("https://news.example/").unwrap();
        let links = finder().extract_html_links(&source, html);
        assert_eq!(
            links,
            vec!["https://news.example/2024/06/stealer-campaign-analysis.html"]
        );
    }

    #[test]
    fn test_parse_feed_links_rss() {
        let rss = r#"<?xml version="1.0"?>
            <rss version="2.0"><channel><title>Feed</title>
              <item><title>One</title><link>https://news.example/one</link></item>
              <item><title>Two</title><link>https://news.example/two</link></item>
            </channel></rss>"#;
        let links = parse_feed_links(rss).unwrap();
        assert_eq!(
            links,
            vec!["https://news.example/one", "https://news.example/two"]
        );
    }

    #[test]
    fn test_parse_feed_links_rejects_html() {
        assert!(parse_feed_links("<html><body>not a feed</body></html>").is_none());
    }

    #[tokio::test]
    async fn test_failed_source_is_fetched_only_once() {
        use std::io::{Read, Write};
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let server_hits = Arc::clone(&hits);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                server_hits.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(
                    b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                );
            }
        });

        // The client is configured with retries; source discovery must not
        // use them.
        let client = HttpClient::new(
            StdDuration::from_secs(5),
            3,
            StdDuration::from_millis(10),
        )
        .unwrap();
        let finder = LinkFinder::new(client, vec![], 3, 2);

        let links = finder.discover(&[format!("http://{addr}/feed")]).await;
        assert!(links.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_history_filter_respects_rescan_threshold() {
        let mut history = HashMap::new();
        history.insert("https://a.example/old".to_string(), Utc::now() - Duration::days(10));
        history.insert("https://a.example/recent".to_string(), Utc::now() - Duration::days(2));

        let links = vec![
            "https://a.example/old".to_string(),
            "https://a.example/recent".to_string(),
            "https://a.example/unseen".to_string(),
        ];
        let eligible = filter_links_by_history(links, &history, Duration::days(5));
        assert_eq!(
            eligible,
            vec!["https://a.example/old", "https://a.example/unseen"]
        );
    }
}
