// file: src/crawler/content.rs
// description: article fetch with jitter/retry and heuristic main-content text extraction
// reference: https://docs.rs/scraper

use crate::crawler::http::HttpClient;
use crate::error::{CrawlError, Result};
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;

/// Extracted text shorter than this is treated as an extraction failure,
/// not as a successfully empty article.
const MIN_CONTENT_CHARS: usize = 50;

/// Site-specific article body containers, tried before generic fallbacks.
const KNOWN_CONTAINER_SELECTORS: &[&str] = &[
    "div.articlebody",
    "div.article-body",
    "div.story-content",
    "div.post-body",
    "div#article-content",
    "div.td-post-content",
];

const CONTENT_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "p", "li", "pre", "code", "table"];

const EXCLUDED_TAGS: &[&str] = &["script", "style", "form", "nav", "footer", "header"];

const EXCLUDED_CLASS_TOKENS: &[&str] = &[
    "ad",
    "advertisement",
    "author-box",
    "related-posts",
    "share",
    "tags",
    "note-b",
];

const SCORING_KEYWORDS: &[&str] = &[
    "article", "content", "post", "news", "story", "main", "body",
];

lazy_static! {
    static ref SPACE_RUN: Regex = Regex::new(r"\s+").expect("SPACE_RUN regex is valid");
}

pub struct ContentExtractor {
    client: HttpClient,
}

impl ContentExtractor {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    /// Fetches one article and returns its cleaned main-content text.
    pub async fn extract(&self, url: &str) -> Result<String> {
        // Jitter spreads request bursts across the worker pool. The value is
        // drawn before the await; the RNG handle is not Send.
        let jitter_ms = rand::rng().random_range(500..=2000);
        tokio::time::sleep(Duration::from_millis(jitter_ms)).await;

        let body = self.client.get_text_with_retry(url).await?;
        extract_article_text(&body).ok_or_else(|| {
            CrawlError::Validation(format!("no usable article content at {url}"))
        })
    }
}

/// Heuristic main-content extraction. Returns `None` when no container
/// yields enough text.
pub fn extract_article_text(body: &str) -> Option<String> {
    let document = Html::parse_document(body);

    let container = find_container(&document)?;
    let text = collect_text(container);
    if text.chars().count() > MIN_CONTENT_CHARS {
        Some(text)
    } else {
        debug!("Extracted content below minimum length, discarding");
        None
    }
}

fn find_container(document: &Html) -> Option<ElementRef<'_>> {
    for selector in KNOWN_CONTAINER_SELECTORS {
        if let Ok(parsed) = Selector::parse(selector) {
            if let Some(element) = document.select(&parsed).next() {
                return Some(element);
            }
        }
    }

    for tag in ["article", "main"] {
        let parsed = Selector::parse(tag).ok()?;
        if let Some(element) = document.select(&parsed).next() {
            return Some(element);
        }
    }

    // Last heuristic before <body>: the div/section whose class or id names
    // suggest article content, preferring the one with the most text.
    let generic = Selector::parse("div, section").ok()?;
    let mut best: Option<(usize, ElementRef<'_>)> = None;
    for element in document.select(&generic) {
        let value = element.value();
        let mut labels: Vec<String> = value.classes().map(str::to_lowercase).collect();
        if let Some(id) = value.id() {
            labels.push(id.to_lowercase());
        }
        let keyword_hit = labels
            .iter()
            .any(|label| SCORING_KEYWORDS.iter().any(|kw| label.contains(kw)));
        if !keyword_hit {
            continue;
        }
        let text_len = element.text().map(str::len).sum::<usize>();
        if best.as_ref().is_none_or(|(len, _)| text_len > *len) {
            best = Some((text_len, element));
        }
    }
    if let Some((_, element)) = best {
        return Some(element);
    }

    let body = Selector::parse("body").ok()?;
    document.select(&body).next()
}

fn collect_text(container: ElementRef<'_>) -> String {
    let content_selector =
        Selector::parse(&CONTENT_TAGS.join(", ")).expect("content selector is valid");

    let mut pieces = Vec::new();
    for element in container.select(&content_selector) {
        if has_excluded_ancestor(element, container) || has_content_tag_ancestor(element, container)
        {
            continue;
        }
        let raw: String = element.text().collect();
        let cleaned = SPACE_RUN.replace_all(raw.trim(), " ").to_string();
        if !cleaned.is_empty() {
            pieces.push(cleaned);
        }
    }
    pieces.join("\n")
}

fn is_excluded(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    if EXCLUDED_TAGS.contains(&value.name()) {
        return true;
    }
    value.classes().any(|class| {
        let class = class.to_lowercase();
        EXCLUDED_CLASS_TOKENS.contains(&class.as_str()) || class.contains("advert")
    })
}

fn has_excluded_ancestor(element: ElementRef<'_>, container: ElementRef<'_>) -> bool {
    for ancestor in element.ancestors() {
        if ancestor.id() == container.id() {
            break;
        }
        if let Some(ancestor) = ElementRef::wrap(ancestor) {
            if is_excluded(&ancestor) {
                return true;
            }
        }
    }
    is_excluded(&element)
}

/// A `<p>` inside an `<li>` would otherwise be emitted twice; only the
/// outermost content element in a nest contributes text.
fn has_content_tag_ancestor(element: ElementRef<'_>, container: ElementRef<'_>) -> bool {
    for ancestor in element.ancestors() {
        if ancestor.id() == container.id() {
            break;
        }
        if let Some(ancestor) = ElementRef::wrap(ancestor) {
            if CONTENT_TAGS.contains(&ancestor.value().name()) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extracts_known_container() {
        let html = r#"
            <html><body>
              <nav><a href="/">Home page navigation links everywhere</a></nav>
              <div class="articlebody">
                <h1>Ransomware crew shifts tactics</h1>
                <p>The operators now deploy a custom loader before encryption begins.</p>
              </div>
              <footer>Copyright notice and other boilerplate text</footer>
            </body></html>
        "#;
        let text = extract_article_text(html).unwrap();
        assert!(text.contains("Ransomware crew shifts tactics"));
        assert!(text.contains("custom loader"));
        assert!(!text.contains("Copyright"));
        assert!(!text.contains("Home page"));
    }

    #[test]
    fn test_strips_excluded_subtrees() {
        let html = r#"
            <article>
              <p>Attackers abused the flaw to install persistent backdoors on servers.</p>
              <div class="author-box"><p>About the author and their many articles</p></div>
              <div class="share"><p>Share this story on social media now</p></div>
            </article>
        "#;
        let text = extract_article_text(html).unwrap();
        assert!(text.contains("persistent backdoors"));
        assert!(!text.contains("About the author"));
        assert!(!text.contains("social media"));
    }

    #[test]
    fn test_short_content_is_failure() {
        let html = "<article><p>Too short.</p></article>";
        assert_eq!(extract_article_text(html), None);
    }

    #[test]
    fn test_keyword_scored_fallback() {
        let html = r#"
            <html><body>
              <div class="sidebar"><p>Tiny sidebar text</p></div>
              <div class="post-content">
                <p>The campaign used spearphishing lures themed around invoices to deliver the payload to targets.</p>
              </div>
            </body></html>
        "#;
        let text = extract_article_text(html).unwrap();
        assert!(text.contains("spearphishing lures"));
    }

    #[test]
    fn test_nested_content_elements_not_duplicated() {
        let html = r#"
            <article>
              <ul><li><p>The loader contacts its control server every five minutes.</p></li></ul>
            </article>
        "#;
        let text = extract_article_text(html).unwrap();
        assert_eq!(
            text.matches("control server").count(),
            1,
            "nested <p> inside <li> must be emitted once"
        );
    }
}
