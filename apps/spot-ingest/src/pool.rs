//! Worker pool coordinator.
//!
//! Spawns one worker per pre-partitioned segment, then waits at a
//! join-all barrier: the pool result is produced only after every worker
//! has reached a terminal state. Workers that fail at construction time
//! do not roll back records written by their siblings.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::model::PriceRecord;
use crate::region::{RegionLookupError, RegionMap};
use crate::store::StoreConnector;
use crate::worker::{WorkerHandle, WorkerState};

/// Aggregated outcome of one pool run.
#[derive(Debug, Clone)]
pub struct PoolResult {
    /// Records successfully upserted across all workers.
    pub records_written: usize,
    /// Records dropped after a lookup or write failure.
    pub records_skipped: usize,
    /// Terminal state of each worker, in worker order.
    pub worker_states: Vec<WorkerState>,
    /// Region-lookup warnings from all workers.
    pub warnings: Vec<RegionLookupError>,
}

impl PoolResult {
    /// Whether any worker ended `Failed`.
    ///
    /// Siblings' writes stand regardless; there is no cross-worker
    /// transaction to roll back.
    #[must_use]
    pub fn partial_failure(&self) -> bool {
        self.worker_states
            .iter()
            .any(|s| matches!(s, WorkerState::Failed))
    }
}

/// Run one worker per segment and wait for all of them to finish.
///
/// Segments come pre-partitioned by [`split`](crate::split::split) with
/// `n` equal to the pool size, so the pool size is `segments.len()`.
/// Empty segments still get a worker; it stops immediately.
pub async fn run_pool(
    segments: Vec<Vec<PriceRecord>>,
    connector: Arc<dyn StoreConnector>,
    regions: Arc<RegionMap>,
) -> PoolResult {
    let pool_size = segments.len();
    info!(pool_size, "starting persistence worker pool");

    let handles: Vec<WorkerHandle> = segments
        .into_iter()
        .enumerate()
        .map(|(worker_id, segment)| {
            WorkerHandle::spawn(worker_id, segment, Arc::clone(&connector), Arc::clone(&regions))
        })
        .collect();

    // Join-all barrier: nothing downstream runs until every worker is
    // terminal.
    let reports = join_all(handles.into_iter().map(WorkerHandle::join)).await;

    let mut result = PoolResult {
        records_written: 0,
        records_skipped: 0,
        worker_states: Vec::with_capacity(pool_size),
        warnings: Vec::new(),
    };
    for report in reports {
        result.records_written += report.records_written;
        result.records_skipped += report.records_skipped;
        result.worker_states.push(report.state);
        result.warnings.extend(report.warnings);
    }

    if result.partial_failure() {
        warn!(
            records_written = result.records_written,
            "worker pool finished with failed workers"
        );
    } else {
        info!(
            records_written = result.records_written,
            records_skipped = result.records_skipped,
            "worker pool finished"
        );
    }

    result
}
