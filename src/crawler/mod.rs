// file: src/crawler/mod.rs
// description: link discovery and article content crawling module exports
// reference: internal module structure

pub mod content;
pub mod http;
pub mod link_finder;

pub use content::ContentExtractor;
pub use http::HttpClient;
pub use link_finder::LinkFinder;
