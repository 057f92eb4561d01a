//! Price source port and the paginated fetcher built on top of it.
//!
//! The external price API is consumed through the [`PriceSource`] trait:
//! one page at a time, with an opaque continuation token. The fetcher
//! drives the port until the token runs out, exposing the result as a
//! lazy, finite, non-restartable stream of record batches.

mod fixture;
mod http;

pub use fixture::FixturePriceSource;
pub use http::HttpPriceSource;

use async_trait::async_trait;
use futures::{Stream, TryStreamExt, stream};

use crate::model::PriceRecord;
use crate::window::TimeWindow;

/// One page of price records plus the continuation token, if any.
#[derive(Debug, Clone, Default)]
pub struct PricePage {
    /// Records on this page.
    pub records: Vec<PriceRecord>,
    /// Token for the next page. `None` means the sequence is exhausted.
    pub next_token: Option<String>,
}

/// Price source transport error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// Network-level failure (timeout, connection reset, DNS).
    #[error("network error: {0}")]
    Network(String),

    /// The API rejected the request outright.
    #[error("price API error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body or status text.
        message: String,
    },

    /// The response body could not be decoded into price records.
    #[error("failed to decode price page: {0}")]
    Decode(String),

    /// Retry budget exhausted for a single page.
    #[error("page fetch failed after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Attempts made before giving up.
        attempts: u32,
    },
}

/// Unrecoverable failure retrieving one region's price data.
///
/// The region's partial results are discarded (all-or-nothing per region);
/// sibling regions are unaffected.
#[derive(Debug, thiserror::Error)]
#[error("failed to fetch spot prices for region '{region}': {source}")]
pub struct FetchError {
    /// Region whose fetch failed.
    pub region: String,
    /// Underlying transport error.
    #[source]
    pub source: SourceError,
}

/// Port for the external paginated price API.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch a single page of spot prices for a region and window.
    async fn fetch_page(
        &self,
        region: &str,
        window: &TimeWindow,
        page_token: Option<&str>,
    ) -> Result<PricePage, SourceError>;

    /// The region catalog, used for the zone-to-region reverse lookup.
    async fn regions(&self) -> Result<Vec<String>, SourceError>;
}

enum Cursor {
    Start,
    Next(String),
    Exhausted,
}

/// Lazily stream record batches for one region, page by page.
///
/// Pages are requested only as the stream is polled; the stream is finite
/// and cannot be restarted. Any page failure ends the stream with a
/// [`FetchError`] for the region.
pub fn page_stream<'a>(
    source: &'a dyn PriceSource,
    region: &'a str,
    window: TimeWindow,
) -> impl Stream<Item = Result<Vec<PriceRecord>, FetchError>> + 'a {
    stream::try_unfold(Cursor::Start, move |cursor| async move {
        let token = match cursor {
            Cursor::Exhausted => return Ok(None),
            Cursor::Start => None,
            Cursor::Next(token) => Some(token),
        };

        let page = source
            .fetch_page(region, &window, token.as_deref())
            .await
            .map_err(|source| FetchError {
                region: region.to_string(),
                source,
            })?;

        let next = page.next_token.map_or(Cursor::Exhausted, Cursor::Next);
        Ok(Some((page.records, next)))
    })
}

/// Drain the page stream for one region into a single collection.
///
/// Safe to invoke concurrently across regions; no state is shared
/// between invocations.
pub async fn fetch_region(
    source: &dyn PriceSource,
    region: &str,
    window: TimeWindow,
) -> Result<Vec<PriceRecord>, FetchError> {
    page_stream(source, region, window)
        .try_fold(Vec::new(), |mut all, mut batch| async move {
            all.append(&mut batch);
            Ok(all)
        })
        .await
}
