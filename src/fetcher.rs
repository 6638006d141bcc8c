use crate::parser::FeedParser;
use crate::types::{ContentItem, CorrespondentError, FetchConfig, Result};
use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, error, warn};
use url::Url;

/// Content source adapter: fetches raw content items from one site URL.
/// A failure for one site must never abort fetching for other sites.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, site_url: &str) -> Result<Vec<ContentItem>>;
}

/// HTTP feed fetcher. Transient failures (timeouts, connection errors, 5xx,
/// 429) are retried with exponential backoff up to the attempt bound;
/// permanent failures (bad URL, other 4xx, malformed body) fail fast.
pub struct FeedFetcher {
    client: Client,
    config: FetchConfig,
}

impl FeedFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    async fn fetch_body(&self, url: &str) -> Result<String> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() || e.is_connect() => {
                return Err(CorrespondentError::TransientFetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                return Err(CorrespondentError::PermanentFetch {
                    url: url.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CorrespondentError::TransientFetch {
                url: url.to_string(),
                reason: format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("unknown")
                ),
            });
        }
        if !status.is_success() {
            return Err(CorrespondentError::PermanentFetch {
                url: url.to_string(),
                reason: format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("unknown")
                ),
            });
        }

        match response.text().await {
            Ok(body) => Ok(body),
            // Connection dropped mid-body reads as transient.
            Err(e) => Err(CorrespondentError::TransientFetch {
                url: url.to_string(),
                reason: format!("body read failed: {}", e),
            }),
        }
    }
}

#[async_trait]
impl ContentSource for FeedFetcher {
    async fn fetch(&self, site_url: &str) -> Result<Vec<ContentItem>> {
        if let Err(e) = Url::parse(site_url) {
            return Err(CorrespondentError::PermanentFetch {
                url: site_url.to_string(),
                reason: format!("invalid URL: {}", e),
            });
        }

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_millis(self.config.backoff_base_ms),
            initial_interval: Duration::from_millis(self.config.backoff_base_ms),
            max_interval: Duration::from_millis(self.config.backoff_cap_ms),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut last_reason = String::new();

        for attempt in 1..=self.config.max_attempts {
            match self.fetch_body(site_url).await {
                Ok(body) => {
                    debug!("fetched {} ({} bytes)", site_url, body.len());
                    let mut parser = FeedParser::new();
                    return parser.parse_items(site_url, &body);
                }
                Err(CorrespondentError::TransientFetch { reason, .. }) => {
                    last_reason = reason;
                    if attempt < self.config.max_attempts {
                        if let Some(delay) = backoff.next_backoff() {
                            warn!(
                                "attempt {}/{} failed for {}: {}, retrying in {:?}",
                                attempt, self.config.max_attempts, site_url, last_reason, delay
                            );
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
                Err(e) => {
                    warn!("giving up on {}: {}", site_url, e);
                    return Err(e);
                }
            }
        }

        error!(
            "fetch exhausted for {} after {} attempts",
            site_url, self.config.max_attempts
        );
        Err(CorrespondentError::FetchExhausted {
            url: site_url.to_string(),
            attempts: self.config.max_attempts,
            reason: last_reason,
        })
    }
}
