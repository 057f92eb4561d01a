//! Scheduled-invocation entry point.
//!
//! Takes an opaque trigger payload, reads all configuration from the
//! environment, and reports success as a boolean. Never panics and never
//! propagates; every failure path is logged.

use serde_json::Value;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::pipeline::Pipeline;
use crate::window::TimeWindow;

/// Run one scheduled ingestion.
///
/// Returns `true` when the run completed, even with partial degradation
/// (dropped regions, skipped records); those are logged. Returns `false`
/// when configuration is invalid or the run failed outright.
pub async fn handle_scheduled(payload: Value) -> bool {
    info!(%payload, "scheduled ingestion triggered");

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "invalid environment configuration");
            return false;
        }
    };

    let window = match TimeWindow::resolve(None, None, Some(settings.default_duration_days)) {
        Ok(window) => window,
        Err(e) => {
            error!(error = %e, "could not resolve a query window");
            return false;
        }
    };

    let pipeline = match Pipeline::from_settings(&settings).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(error = %e, "pipeline assembly failed");
            return false;
        }
    };

    run_scheduled(&pipeline, &settings.target_regions, window).await
}

/// Drive one scheduled run over an already-assembled pipeline.
///
/// A completed run reports `true` even when degraded; only a fatal run
/// error reports `false`.
pub async fn run_scheduled(
    pipeline: &Pipeline,
    target_regions: &[String],
    window: TimeWindow,
) -> bool {
    match pipeline.run(target_regions, window).await {
        Ok(report) => {
            if report.partial_failure() {
                warn!(
                    regions_failed = report.regions_failed.len(),
                    records_skipped = report.records_skipped,
                    artifacts_failed = report.artifacts_failed,
                    "scheduled run completed with degradation"
                );
            }
            true
        }
        Err(e) => {
            error!(error = %e, "scheduled run failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::*;
    use crate::model::PriceRecord;
    use crate::source::FixturePriceSource;
    use crate::store::{InMemoryRecordStore, InMemoryStoreConnector};

    fn window() -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).single().unwrap(),
        )
        .unwrap()
    }

    fn record() -> PriceRecord {
        PriceRecord::new(
            "us-east-1",
            "us-east-1a",
            "t2.micro",
            "Linux/UNIX",
            Decimal::new(1, 2),
            Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).single().unwrap(),
        )
        .unwrap()
    }

    fn pipeline(source: FixturePriceSource, store: &InMemoryRecordStore) -> Pipeline {
        Pipeline::new(
            Arc::new(source),
            Arc::new(InMemoryStoreConnector::new(store.clone())),
            2,
        )
    }

    #[tokio::test]
    async fn completed_run_reports_success() {
        let store = InMemoryRecordStore::new();
        let source = FixturePriceSource::new().with_records("us-east-1", vec![record()]);

        let ok = run_scheduled(
            &pipeline(source, &store),
            &["us-east-1".to_string()],
            window(),
        )
        .await;

        assert!(ok);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn degraded_run_still_reports_success() {
        let store = InMemoryRecordStore::new();
        // One region delivers, the other fails its fetch outright.
        let source = FixturePriceSource::new()
            .with_records("us-east-1", vec![record()])
            .with_failure("us-west-2");

        let ok = run_scheduled(
            &pipeline(source, &store),
            &["us-east-1".to_string(), "us-west-2".to_string()],
            window(),
        )
        .await;

        assert!(ok);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn fatal_run_reports_failure() {
        let store = InMemoryRecordStore::new();
        let source = FixturePriceSource::new().with_failure("us-east-1");

        let ok = run_scheduled(
            &pipeline(source, &store),
            &["us-east-1".to_string()],
            window(),
        )
        .await;

        assert!(!ok);
        assert!(store.is_empty());
    }
}
