// file: src/config.rs
// description: application configuration management with toml support
// reference: https://docs.rs/config

use crate::error::{CrawlError, Result};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub sources: SourcesConfig,
    pub crawler: CrawlerConfig,
    pub extraction: ExtractionConfig,
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourcesConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub blacklist_keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlerConfig {
    pub link_workers: usize,
    pub content_workers: usize,
    pub request_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_backoff_secs: u64,
    pub rescan_after_days: i64,
    pub link_score_threshold: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractionConfig {
    pub settings_dir: PathBuf,
    pub context_window_chars: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnrichmentConfig {
    pub proximity_window_chars: usize,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv().ok();

        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        } else {
            builder = builder.add_source(config::File::from(Path::new("config/default.toml")));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("IOC_HARVEST")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| CrawlError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| CrawlError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self {
            sources: SourcesConfig {
                urls: vec![
                    "https://www.bleepingcomputer.com/".to_string(),
                    "https://thehackernews.com/".to_string(),
                    "https://blog.talosintelligence.com/".to_string(),
                ],
                blacklist_keywords: vec![],
            },
            crawler: CrawlerConfig {
                link_workers: 4,
                content_workers: 3,
                request_timeout_secs: 15,
                retry_attempts: 3,
                retry_backoff_secs: 3,
                rescan_after_days: 5,
                link_score_threshold: 3,
            },
            extraction: ExtractionConfig {
                settings_dir: PathBuf::from("settings"),
                context_window_chars: 50,
            },
            enrichment: EnrichmentConfig {
                proximity_window_chars: 250,
            },
        }
    }

    fn validate(&self) -> Result<()> {
        if self.crawler.link_workers == 0 || self.crawler.content_workers == 0 {
            return Err(CrawlError::Config(
                "worker counts must be greater than 0".to_string(),
            ));
        }

        if self.crawler.retry_attempts == 0 {
            return Err(CrawlError::Config(
                "retry_attempts must be greater than 0".to_string(),
            ));
        }

        if self.crawler.rescan_after_days < 0 {
            return Err(CrawlError::Config(
                "rescan_after_days must not be negative".to_string(),
            ));
        }

        if self.enrichment.proximity_window_chars == 0 {
            return Err(CrawlError::Config(
                "proximity_window_chars must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
