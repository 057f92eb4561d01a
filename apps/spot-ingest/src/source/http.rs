//! HTTP price source adapter with bounded per-page retry.
//!
//! Transient failures (rate limiting, gateway errors, network faults) are
//! retried with exponential backoff and jitter up to the configured
//! attempt budget; anything else fails the page immediately.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::warn;

use super::{PricePage, PriceSource, SourceError};
use crate::config::RetrySettings;
use crate::model::PriceRecord;
use crate::window::TimeWindow;

/// Wire shape of one spot price history page.
#[derive(Debug, Deserialize)]
struct WirePage {
    #[serde(rename = "SpotPriceHistory", default)]
    spot_price_history: Vec<WireRecord>,
    #[serde(rename = "NextToken", default)]
    next_token: Option<String>,
}

/// Wire shape of a single spot price sample.
#[derive(Debug, Deserialize)]
struct WireRecord {
    #[serde(rename = "AvailabilityZone")]
    availability_zone: String,
    #[serde(rename = "InstanceType")]
    instance_type: String,
    #[serde(rename = "ProductDescription")]
    product_description: String,
    #[serde(rename = "SpotPrice")]
    spot_price: String,
    #[serde(rename = "Timestamp")]
    timestamp: DateTime<Utc>,
}

/// Wire shape of the region catalog.
#[derive(Debug, Deserialize)]
struct WireRegions {
    #[serde(rename = "Regions", default)]
    regions: Vec<WireRegion>,
}

#[derive(Debug, Deserialize)]
struct WireRegion {
    #[serde(rename = "RegionName")]
    region_name: String,
}

/// HTTP-backed [`PriceSource`].
#[derive(Debug, Clone)]
pub struct HttpPriceSource {
    client: Client,
    base_url: String,
    page_size: u32,
    retry: RetrySettings,
}

impl HttpPriceSource {
    /// Build a source against `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        page_size: u32,
        retry: RetrySettings,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size,
            retry,
        })
    }

    /// GET `path` with retry, returning the response body on success.
    async fn get_with_retry(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<String, SourceError> {
        let url = format!("{}{path}", self.base_url);
        let mut backoff = ExponentialBackoff::new(&self.retry);

        loop {
            let response = match self.client.get(&url).query(query).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if let Some(delay) = backoff.next_backoff() {
                        warn!(
                            error = %e,
                            delay_ms = delay.as_millis(),
                            attempt = backoff.attempt,
                            "network error fetching price page, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(SourceError::MaxRetriesExceeded {
                        attempts: backoff.attempt,
                    });
                }
            };

            let status = response.status();

            if status.is_success() {
                return response
                    .text()
                    .await
                    .map_err(|e| SourceError::Network(e.to_string()));
            }

            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());

            if is_retryable(status) {
                // Every retryable response consumes an attempt; the
                // server-provided delay only overrides the duration.
                let Some(computed) = backoff.next_backoff() else {
                    return Err(SourceError::MaxRetriesExceeded {
                        attempts: backoff.attempt,
                    });
                };
                let delay = retry_after.map_or(computed, Duration::from_secs);
                warn!(
                    status = status.as_u16(),
                    delay_ms = delay.as_millis(),
                    attempt = backoff.attempt,
                    "transient price API error, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let message = response.text().await.unwrap_or_default();
            return Err(SourceError::Api {
                status: status.as_u16(),
                message,
            });
        }
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn fetch_page(
        &self,
        region: &str,
        window: &TimeWindow,
        page_token: Option<&str>,
    ) -> Result<PricePage, SourceError> {
        let (start, end) = window.file_stamps();
        let mut query = vec![
            ("region", region.to_string()),
            ("startTime", start),
            ("endTime", end),
            ("maxResults", self.page_size.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("nextToken", token.to_string()));
        }

        let body = self.get_with_retry("/spot-price-history", &query).await?;
        let wire: WirePage =
            serde_json::from_str(&body).map_err(|e| SourceError::Decode(e.to_string()))?;

        let mut records = Vec::with_capacity(wire.spot_price_history.len());
        for entry in wire.spot_price_history {
            let price = entry
                .spot_price
                .parse()
                .map_err(|e| SourceError::Decode(format!("bad price '{}': {e}", entry.spot_price)))?;
            let record = PriceRecord::new(
                region,
                entry.availability_zone,
                entry.instance_type,
                entry.product_description,
                price,
                entry.timestamp,
            )
            .map_err(|e| SourceError::Decode(e.to_string()))?;
            records.push(record);
        }

        Ok(PricePage {
            records,
            next_token: wire.next_token.filter(|t| !t.is_empty()),
        })
    }

    async fn regions(&self) -> Result<Vec<String>, SourceError> {
        let body = self.get_with_retry("/regions", &[]).await?;
        let wire: WireRegions =
            serde_json::from_str(&body).map_err(|e| SourceError::Decode(e.to_string()))?;
        Ok(wire.regions.into_iter().map(|r| r.region_name).collect())
    }
}

/// Whether the HTTP status warrants another attempt.
fn is_retryable(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429) || status.is_server_error()
}

/// Exponential backoff with jitter.
struct ExponentialBackoff {
    attempt: u32,
    max_attempts: u32,
    current: Duration,
    max: Duration,
    multiplier: f64,
    jitter_factor: f64,
}

impl ExponentialBackoff {
    const fn new(settings: &RetrySettings) -> Self {
        Self {
            attempt: 0,
            max_attempts: settings.max_attempts,
            current: settings.initial_backoff,
            max: settings.max_backoff,
            multiplier: settings.multiplier,
            jitter_factor: settings.jitter_factor,
        }
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }

        let base = self.current;
        self.current = Duration::from_secs_f64(
            (self.current.as_secs_f64() * self.multiplier).min(self.max.as_secs_f64()),
        );

        Some(apply_jitter(base, self.jitter_factor))
    }
}

/// Random delay in `[base * (1 - jitter), base * (1 + jitter)]`.
fn apply_jitter(base: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return base;
    }
    let base_secs = base.as_secs_f64();
    let spread = base_secs * jitter_factor;
    let jittered = rand::rng().random_range((base_secs - spread).max(0.0)..=base_secs + spread);
    Duration::from_secs_f64(jittered)
}
