// file: src/crawler/http.rs
// description: shared HTTP client with browser headers and retry-with-backoff fetching
// reference: https://docs.rs/reqwest

use crate::error::{CrawlError, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Thin wrapper over one connection-pooled client. Cloning is cheap; every
/// worker shares the same pool.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    retry_attempts: u32,
    retry_backoff: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration, retry_attempts: u32, retry_backoff: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(CrawlError::Http)?;
        Ok(Self {
            client,
            retry_attempts,
            retry_backoff,
        })
    }

    /// Single fetch of `url` as text, no retries.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|source| CrawlError::Fetch {
                url: url.to_string(),
                source,
            })?;
        response.text().await.map_err(|source| CrawlError::Fetch {
            url: url.to_string(),
            source,
        })
    }

    /// Fetch with exponential backoff: attempt `n` sleeps `backoff * 2^n`
    /// before retrying. Returns the last error once attempts are exhausted.
    pub async fn get_text_with_retry(&self, url: &str) -> Result<String> {
        let mut last_error = None;
        for attempt in 0..self.retry_attempts {
            match self.get_text(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    warn!("Fetch attempt {} failed for {}: {}", attempt + 1, url, e);
                    last_error = Some(e);
                    if attempt + 1 < self.retry_attempts {
                        let wait = self.retry_backoff * 2u32.pow(attempt);
                        debug!("Retrying {} in {:?}", url, wait);
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }
        Err(last_error.unwrap_or_else(|| CrawlError::Validation(format!("no attempts configured for {url}"))))
    }
}
