// file: src/pipeline/orchestrator.rs
// description: sequences link discovery, content extraction, IOC extraction, and enrichment
// reference: src/crawler, src/extractor, src/enrichment

use crate::config::Config;
use crate::crawler::{link_finder, ContentExtractor, HttpClient, LinkFinder};
use crate::enrichment::EnrichmentEngine;
use crate::error::Result;
use crate::extractor::{IocExtractor, ReferenceData};
use crate::pipeline::progress::{ProgressTracker, RunSummary};
use crate::store::Store;
use chrono::Duration;
use futures::{stream, StreamExt};
use std::collections::HashMap;
use std::time::{Duration as StdDuration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Process every discovered link even if recently scanned.
    pub ignore_history: bool,
    /// Cap the number of articles processed this run.
    pub limit: Option<usize>,
    pub colored_output: bool,
}

pub struct Orchestrator<'a> {
    config: &'a Config,
    store: &'a dyn Store,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a Config, store: &'a dyn Store) -> Self {
        Self { config, store }
    }

    pub async fn run(&self, options: &RunOptions) -> Result<RunSummary> {
        let started = Instant::now();
        let summary = self.execute(options).await?;
        Ok(stamp_duration(summary, started))
    }

    async fn execute(&self, options: &RunOptions) -> Result<RunSummary> {
        let mut summary = RunSummary::new();

        if self.config.sources.urls.is_empty() {
            warn!("No sources configured, nothing to crawl");
            return Ok(summary);
        }

        let client = HttpClient::new(
            StdDuration::from_secs(self.config.crawler.request_timeout_secs),
            self.config.crawler.retry_attempts,
            StdDuration::from_secs(self.config.crawler.retry_backoff_secs),
        )?;

        let finder = LinkFinder::new(
            client.clone(),
            self.config.sources.blacklist_keywords.clone(),
            self.config.crawler.link_score_threshold,
            self.config.crawler.link_workers,
        );
        let mut links = finder.discover(&self.config.sources.urls).await;
        info!("Discovered {} candidate links", links.len());

        if options.ignore_history {
            debug!("Skipping scan-history filtering");
        } else {
            let history = self.store.read_scan_history("")?;
            links = link_finder::filter_links_by_history(
                links,
                &history,
                Duration::days(self.config.crawler.rescan_after_days),
            );
            info!("{} links eligible after rescan filtering", links.len());
        }

        if let Some(limit) = options.limit {
            links.truncate(limit);
        }
        summary.links_found = links.len();

        if links.is_empty() {
            info!("No eligible links this run");
            return Ok(summary);
        }

        let texts = self
            .extract_articles(&client, &links, options.colored_output)
            .await;
        summary.articles_extracted = texts.len();
        summary.articles_failed = links.len() - texts.len();

        let reference = ReferenceData::load(&self.config.extraction.settings_dir, self.store)?;
        let extractor = IocExtractor::new(reference, self.config.extraction.context_window_chars);

        let mut findings = Vec::new();
        for (index, text) in &texts {
            findings.extend(extractor.extract(text, *index));
        }
        info!("Extracted {} findings from {} articles", findings.len(), texts.len());

        if findings.is_empty() {
            info!("No indicators found this run");
            return Ok(summary);
        }

        let engine =
            EnrichmentEngine::new(self.store, self.config.enrichment.proximity_window_chars);
        let records = engine.process(&findings, &links, &texts)?;
        summary.indicators_produced = records.len();

        for record in &records {
            if let Err(e) = self.store.persist_indicator(record) {
                warn!("Failed to persist {} ({}): {}", record.ioc_value, record.ioc_type.as_str(), e);
            }
        }

        // History is only written once enrichment has succeeded, so a failed
        // run leaves its articles eligible for the next one.
        let processed: Vec<String> = texts
            .keys()
            .filter_map(|index| links.get(*index).cloned())
            .collect();
        self.store.write_scan_history(&processed)?;

        Ok(summary)
    }

    async fn extract_articles(
        &self,
        client: &HttpClient,
        links: &[String],
        colored_output: bool,
    ) -> HashMap<usize, String> {
        let extractor = ContentExtractor::new(client.clone());
        let tracker = ProgressTracker::with_color(links.len(), colored_output);
        let tracker_ref = &tracker;
        let extractor_ref = &extractor;

        let results: Vec<(usize, Option<String>)> = stream::iter(links.iter().enumerate())
            .map(|(index, url)| async move {
                tracker_ref.set_message(url.clone());
                match extractor_ref.extract(url).await {
                    Ok(text) => {
                        tracker_ref.inc_extracted();
                        (index, Some(text))
                    }
                    Err(e) => {
                        warn!("Content extraction failed for {}: {}", url, e);
                        tracker_ref.inc_failed();
                        (index, None)
                    }
                }
            })
            .buffer_unordered(self.config.crawler.content_workers)
            .collect()
            .await;
        tracker.finish();
        info!(
            "Content extraction finished: {} ok, {} failed in {}s",
            tracker.extracted(),
            tracker.failed(),
            tracker.elapsed_secs()
        );

        results
            .into_iter()
            .filter_map(|(index, text)| text.map(|t| (index, t)))
            .collect()
    }
}

fn stamp_duration(mut summary: RunSummary, started: Instant) -> RunSummary {
    summary.duration_secs = started.elapsed().as_secs();
    summary
}
