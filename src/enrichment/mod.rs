// file: src/enrichment/mod.rs
// description: enrichment and deduplication module exports
// reference: internal module structure

pub mod engine;

pub use engine::EnrichmentEngine;
