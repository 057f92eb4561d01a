//! Canned price source for tests and offline development.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{PricePage, PriceSource, SourceError};
use crate::model::PriceRecord;
use crate::window::TimeWindow;

/// In-memory [`PriceSource`] serving pre-built pages per region.
///
/// Not for production use.
#[derive(Debug, Default)]
pub struct FixturePriceSource {
    pages: HashMap<String, Vec<Vec<PriceRecord>>>,
    fail_regions: HashSet<String>,
    pages_served: AtomicUsize,
}

impl FixturePriceSource {
    /// Create an empty source. Every region fetch returns a single
    /// empty page until pages are added.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `pages` for `region`, in order, one per `fetch_page` call.
    #[must_use]
    pub fn with_pages(mut self, region: &str, pages: Vec<Vec<PriceRecord>>) -> Self {
        self.pages.insert(region.to_string(), pages);
        self
    }

    /// Serve all of `records` for `region` as one page.
    #[must_use]
    pub fn with_records(self, region: &str, records: Vec<PriceRecord>) -> Self {
        self.with_pages(region, vec![records])
    }

    /// Make every `fetch_page` call for `region` fail.
    #[must_use]
    pub fn with_failure(mut self, region: &str) -> Self {
        self.fail_regions.insert(region.to_string());
        self
    }

    /// Number of pages served so far.
    #[must_use]
    pub fn pages_served(&self) -> usize {
        self.pages_served.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for FixturePriceSource {
    async fn fetch_page(
        &self,
        region: &str,
        _window: &TimeWindow,
        page_token: Option<&str>,
    ) -> Result<PricePage, SourceError> {
        if self.fail_regions.contains(region) {
            return Err(SourceError::Api {
                status: 500,
                message: "fixture configured to fail".to_string(),
            });
        }

        self.pages_served.fetch_add(1, Ordering::SeqCst);

        let pages = match self.pages.get(region) {
            Some(pages) => pages,
            None => return Ok(PricePage::default()),
        };

        let index: usize = match page_token {
            None => 0,
            Some(token) => token
                .parse()
                .map_err(|_| SourceError::Decode(format!("bad fixture token '{token}'")))?,
        };

        let records = pages.get(index).cloned().unwrap_or_default();
        let next_token = (index + 1 < pages.len()).then(|| (index + 1).to_string());

        Ok(PricePage {
            records,
            next_token,
        })
    }

    async fn regions(&self) -> Result<Vec<String>, SourceError> {
        let mut regions: Vec<String> = self.pages.keys().cloned().collect();
        regions.sort();
        Ok(regions)
    }
}
