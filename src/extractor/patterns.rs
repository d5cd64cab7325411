// file: src/extractor/patterns.rs
// description: compiled regex patterns for indicator extraction plus dynamic reference patterns
// reference: https://docs.rs/regex

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

/// File extensions recognized by the FILE pattern.
const FILE_EXTENSIONS: &str = "exe|dll|sys|bat|ps1|sh|py|js|png|jpg|jpeg|gif|bmp|tiff|svg|pdf|\
                               txt|doc|docx|xls|xlsx|ppt|pptx|zip|rar|7z|tar|gz|iso|img|cer|pem|\
                               key|csr|html|htm|css|json|xml|yaml|yml|query|log|bak|tmp|temp|cfg|\
                               ini|conf";

lazy_static! {
    pub static ref URL: Regex = Regex::new(
        r"(?i)\b(?:hxxps?|https?|ftps?)://[^\s/$.?#].\S*\b"
    ).expect("URL regex is valid");

    // Tolerates defanged ([.]) and spaced octets; refanging collapses both.
    pub static ref IPV4: Regex = Regex::new(
        r"\b(?:(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])(?:\[\.\]|\.|\s)){3}(?:25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\b"
    ).expect("IPV4 regex is valid");

    // The email pattern starts earlier than the bare-domain match inside an
    // address, so overlap resolution keeps emails from leaking domains.
    pub static ref DOMAIN: Regex = Regex::new(
        r"\b(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\[\.\]|\(\.\)|\.))+[a-zA-Z]{2,24}\b"
    ).expect("DOMAIN regex is valid");

    pub static ref EMAIL: Regex = Regex::new(
        r"(?i)\b[a-zA-Z0-9._%+-]+(?:@|\[@\])[a-zA-Z0-9.-]+(?:\[\.\]|\.)[a-zA-Z]{2,24}\b"
    ).expect("EMAIL regex is valid");

    pub static ref MD5: Regex = Regex::new(r"\b[a-fA-F0-9]{32}\b").expect("MD5 regex is valid");

    pub static ref SHA1: Regex = Regex::new(r"\b[a-fA-F0-9]{40}\b").expect("SHA1 regex is valid");

    pub static ref SHA256: Regex =
        Regex::new(r"\b[a-fA-F0-9]{64}\b").expect("SHA256 regex is valid");

    pub static ref CVE: Regex = Regex::new(
        r"(?i)\bCVE-(?:1999|2\d{3})-(?:0\d{2}[1-9]|[1-9]\d{3,})\b"
    ).expect("CVE regex is valid");

    // The rust regex crate has no look-ahead, so the trailing delimiter is a
    // consumed alternation and callers take the span of capture group 1.
    pub static ref FILE: Regex = Regex::new(
        &format!(r#"(?i)([^\s"]+?\.(?:{FILE_EXTENSIONS}))(?:[\s,;]|$)"#)
    ).expect("FILE regex is valid");
}

/// Builds a word-bounded, case-insensitive alternation over reference names,
/// longest-first so overlapping surface forms prefer the most specific one.
/// Returns `None` for an empty list (a never-matching pattern).
pub fn build_alternation_pattern(names: &[String]) -> Option<Regex> {
    let mut names: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|n| !n.trim().is_empty())
        .collect();
    if names.is_empty() {
        return None;
    }
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));

    let escaped: Vec<String> = names.iter().map(|n| regex::escape(n)).collect();
    let pattern = format!(r"\b(?:{})\b", escaped.join("|"));
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .ok()
}

/// Whether `text` is matched by `re` in its entirety.
pub fn full_match(re: &Regex, text: &str) -> bool {
    re.find(text)
        .is_some_and(|m| m.start() == 0 && m.end() == text.len())
}
