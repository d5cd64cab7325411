// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod crawler;
pub mod enrichment;
pub mod error;
pub mod extractor;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod utils;

pub use config::{Config, CrawlerConfig, EnrichmentConfig, ExtractionConfig, SourcesConfig};
pub use crawler::{ContentExtractor, HttpClient, LinkFinder};
pub use enrichment::EnrichmentEngine;
pub use error::{CrawlError, Result};
pub use extractor::{IocExtractor, ReferenceData};
pub use models::{Entity, EntityKind, Finding, IndicatorRecord, IocType, Mention};
pub use pipeline::{Orchestrator, ProgressTracker, RunOptions, RunSummary};
pub use store::{MemoryStore, Store};
