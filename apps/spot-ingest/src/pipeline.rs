//! End-to-end pipeline orchestration.
//!
//! Resolver → per-region fetch → splitter → worker pool → aggregator →
//! artifact writer, with one [`RunReport`] summarizing the whole run.
//! Fetches run concurrently across regions with no shared state; a failed
//! region is dropped with a warning and only sinks the run when every
//! region fails.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{info, warn};

use crate::aggregate::{Aggregation, aggregate};
use crate::artifact::{Destination, instance_types_key, prices_key, write};
use crate::error::IngestError;
use crate::model::PriceRecord;
use crate::pool::run_pool;
use crate::region::RegionMap;
use crate::source::{PriceSource, fetch_region};
use crate::split::split;
use crate::store::{ObjectStore, StoreConnector};
use crate::window::TimeWindow;
use crate::worker::WorkerState;

/// Summary of one pipeline run.
#[derive(Debug)]
pub struct RunReport {
    /// Window the run queried.
    pub window: TimeWindow,
    /// Regions whose fetch succeeded.
    pub regions_fetched: Vec<String>,
    /// Regions whose fetch failed and were dropped.
    pub regions_failed: Vec<String>,
    /// Total records fetched across all successful regions.
    pub records_fetched: usize,
    /// Records upserted to the durable store.
    pub records_written: usize,
    /// Records skipped after lookup or write failures.
    pub records_skipped: usize,
    /// Terminal state of each pool worker.
    pub worker_states: Vec<WorkerState>,
    /// Instance-type aggregation over the fetched records.
    pub aggregation: Aggregation,
    /// Artifacts delivered successfully.
    pub artifacts_written: usize,
    /// Artifacts that failed to deliver.
    pub artifacts_failed: usize,
    /// Wall-clock duration of the run.
    pub elapsed: std::time::Duration,
}

impl RunReport {
    /// Whether anything in the run degraded: a dropped region, a failed
    /// worker, a skipped record, or a failed artifact.
    #[must_use]
    pub fn partial_failure(&self) -> bool {
        !self.regions_failed.is_empty()
            || self.records_skipped > 0
            || self.artifacts_failed > 0
            || self
                .worker_states
                .iter()
                .any(|s| matches!(s, WorkerState::Failed))
    }
}

/// Assembled pipeline over the external ports.
pub struct Pipeline {
    source: Arc<dyn PriceSource>,
    connector: Arc<dyn StoreConnector>,
    object_store: Option<(Arc<dyn ObjectStore>, String)>,
    artifact_dir: Option<PathBuf>,
    pool_size: usize,
}

impl Pipeline {
    /// Pipeline with the mandatory ports; artifact destinations are off
    /// until configured.
    #[must_use]
    pub fn new(
        source: Arc<dyn PriceSource>,
        connector: Arc<dyn StoreConnector>,
        pool_size: usize,
    ) -> Self {
        Self {
            source,
            connector,
            object_store: None,
            artifact_dir: None,
            pool_size: pool_size.max(1),
        }
    }

    /// Also upload artifacts to `bucket` through `store`.
    #[must_use]
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        self.object_store = Some((store, bucket.into()));
        self
    }

    /// Also write artifacts under `dir` on the local filesystem.
    #[must_use]
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    /// Assemble the production pipeline from settings: HTTP price source,
    /// turso durable table, and (when a bucket is configured) the HTTP
    /// object store.
    ///
    /// # Errors
    ///
    /// Fails if an HTTP client cannot be built or the local database
    /// cannot be opened.
    pub async fn from_settings(settings: &crate::config::Settings) -> Result<Self, IngestError> {
        let source = crate::source::HttpPriceSource::new(
            &settings.api_base_url,
            settings.page_size,
            settings.retry.clone(),
        )?;
        let connector =
            crate::store::TableStoreConnector::open(&settings.db_path, &settings.table_name)
                .await?;

        let mut pipeline = Self::new(Arc::new(source), Arc::new(connector), settings.pool_size);
        if !settings.bucket.is_empty() {
            let store = crate::store::HttpObjectStore::new(&settings.object_store_url)?;
            pipeline = pipeline.with_object_store(Arc::new(store), settings.bucket.clone());
        }
        Ok(pipeline)
    }

    /// Execute one full run over `window` for `target_regions`.
    ///
    /// # Errors
    ///
    /// Fails only when every target region's fetch fails; all other
    /// degradation is recorded in the report.
    pub async fn run(
        &self,
        target_regions: &[String],
        window: TimeWindow,
    ) -> Result<RunReport, IngestError> {
        let started = Instant::now();
        info!(%window, regions = target_regions.len(), "pipeline run starting");

        let region_map = Arc::new(self.load_region_map(target_regions).await);

        // Per-region fetches are independent; run them concurrently.
        let outcomes = join_all(
            target_regions
                .iter()
                .map(|region| fetch_region(self.source.as_ref(), region, window)),
        )
        .await;

        let mut groups: Vec<(String, Vec<PriceRecord>)> = Vec::new();
        let mut regions_failed = Vec::new();
        for (region, outcome) in target_regions.iter().zip(outcomes) {
            match outcome {
                Ok(records) => {
                    info!(region, records = records.len(), "region fetched");
                    groups.push((region.clone(), records));
                }
                Err(e) => {
                    warn!(region, error = %e, "dropping region after fetch failure");
                    regions_failed.push(region.clone());
                }
            }
        }
        if groups.is_empty() && !regions_failed.is_empty() {
            return Err(IngestError::AllRegionsFailed(regions_failed.len()));
        }

        let all_records: Vec<PriceRecord> = groups
            .iter()
            .flat_map(|(_, records)| records.iter().cloned())
            .collect();
        let records_fetched = all_records.len();
        let aggregation = aggregate(&all_records);

        let pool = run_pool(
            split(all_records, self.pool_size),
            Arc::clone(&self.connector),
            region_map,
        )
        .await;

        let (artifacts_written, artifacts_failed) =
            self.write_artifacts(&groups, &aggregation, &window).await;

        let report = RunReport {
            window,
            regions_fetched: groups.into_iter().map(|(region, _)| region).collect(),
            regions_failed,
            records_fetched,
            records_written: pool.records_written,
            records_skipped: pool.records_skipped,
            worker_states: pool.worker_states,
            aggregation,
            artifacts_written,
            artifacts_failed,
            elapsed: started.elapsed(),
        };
        log_report(&report);
        Ok(report)
    }

    /// Fetch the region catalog for the reverse zone lookup.
    ///
    /// The map is scoped to this run. A catalog failure degrades to the
    /// target list itself so the run can still proceed.
    async fn load_region_map(&self, target_regions: &[String]) -> RegionMap {
        match self.source.regions().await {
            Ok(catalog) if !catalog.is_empty() => RegionMap::new(catalog),
            Ok(_) => RegionMap::new(target_regions.to_vec()),
            Err(e) => {
                warn!(error = %e, "region catalog unavailable, using target list");
                RegionMap::new(target_regions.to_vec())
            }
        }
    }

    async fn write_artifacts(
        &self,
        groups: &[(String, Vec<PriceRecord>)],
        aggregation: &Aggregation,
        window: &TimeWindow,
    ) -> (usize, usize) {
        let mut written = 0;
        let mut failed = 0;
        let mut tally = |ok: bool| if ok { written += 1 } else { failed += 1 };

        for (region, records) in groups {
            let key = prices_key(region, window);
            if let Some(dir) = &self.artifact_dir {
                tally(write(records, Destination::LocalFile { dir, key: &key }).await);
            }
            if let Some((store, bucket)) = &self.object_store {
                tally(
                    write(records, Destination::Blob { store: store.as_ref(), bucket, key: &key })
                        .await,
                );
            }
        }

        let key = instance_types_key(window);
        let types = &aggregation.unique_instance_types;
        if let Some(dir) = &self.artifact_dir {
            tally(write(types, Destination::LocalFile { dir, key: &key }).await);
        }
        if let Some((store, bucket)) = &self.object_store {
            tally(
                write(types, Destination::Blob { store: store.as_ref(), bucket, key: &key }).await,
            );
        }

        (written, failed)
    }
}

fn log_report(report: &RunReport) {
    let failed_workers = report
        .worker_states
        .iter()
        .filter(|s| matches!(s, WorkerState::Failed))
        .count();
    info!(
        elapsed_ms = report.elapsed.as_millis(),
        regions_fetched = report.regions_fetched.len(),
        regions_failed = report.regions_failed.len(),
        records_fetched = report.records_fetched,
        records_written = report.records_written,
        records_skipped = report.records_skipped,
        instance_types = report.aggregation.unique_instance_types.len(),
        artifacts_written = report.artifacts_written,
        artifacts_failed = report.artifacts_failed,
        failed_workers,
        "pipeline run complete"
    );
}
