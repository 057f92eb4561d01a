//! Persistence worker: one segment, one store handle, cooperative stop.
//!
//! A worker owns its segment and its store handle exclusively. Records are
//! upserted sequentially in segment order; the only shared data a worker
//! reads is the immutable region catalog. Cancellation is cooperative: a
//! stop request is honored between records, never mid-upsert.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::model::PriceRecord;
use crate::region::{RegionLookupError, RegionMap};
use crate::store::StoreConnector;

/// Lifecycle state of one persistence worker.
///
/// `Idle → Running → Stopped | Failed`, with `Running → StopRequested →
/// Stopped` on cooperative cancellation. Mutated only by the worker
/// itself; the coordinator observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, store handle not yet opened.
    Idle,
    /// Processing its segment.
    Running,
    /// Stop observed; finishing the in-flight record.
    StopRequested,
    /// Terminal: segment drained or stop honored.
    Stopped,
    /// Terminal: store handle could not be opened.
    Failed,
}

impl WorkerState {
    /// Whether the worker can make no further progress.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }
}

/// What one worker accomplished, reported at join time.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    /// Position of this worker in the pool.
    pub worker_id: usize,
    /// Terminal state the worker ended in.
    pub state: WorkerState,
    /// Records successfully upserted.
    pub records_written: usize,
    /// Records dropped after a lookup or write failure.
    pub records_skipped: usize,
    /// Region lookups that failed, one per skipped record.
    pub warnings: Vec<RegionLookupError>,
}

/// Coordinator-side handle to a spawned worker.
pub struct WorkerHandle {
    worker_id: usize,
    state: Arc<Mutex<WorkerState>>,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<WorkerReport>,
}

impl WorkerHandle {
    /// Spawn a worker over `segment`.
    ///
    /// The store handle is opened inside the task; a connect failure ends
    /// the worker in `Failed` without touching any records.
    #[must_use]
    pub fn spawn(
        worker_id: usize,
        segment: Vec<PriceRecord>,
        connector: Arc<dyn StoreConnector>,
        regions: Arc<RegionMap>,
    ) -> Self {
        let state = Arc::new(Mutex::new(WorkerState::Idle));
        let (stop_tx, stop_rx) = watch::channel(false);
        let task_state = Arc::clone(&state);
        let task = tokio::spawn(async move {
            run(worker_id, segment, connector, regions, task_state, stop_rx).await
        });

        Self {
            worker_id,
            state,
            stop_tx,
            task,
        }
    }

    /// Position of this worker in the pool.
    #[must_use]
    pub const fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Observe the worker's current state.
    #[must_use]
    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Request a cooperative stop and wait for the worker to exit.
    ///
    /// The worker finishes its in-flight record, skips the rest of its
    /// segment, and reaches `Stopped`. Returns the final report, same as
    /// [`join`](Self::join).
    pub async fn stop(self) -> WorkerReport {
        // Send fails only if the worker already exited, which is fine.
        let _ = self.stop_tx.send(true);
        self.join().await
    }

    /// Wait for the worker to reach a terminal state.
    pub async fn join(self) -> WorkerReport {
        let worker_id = self.worker_id;
        match self.task.await {
            Ok(report) => report,
            Err(e) => {
                warn!(worker_id, error = %e, "worker task aborted");
                *self.state.lock() = WorkerState::Failed;
                WorkerReport {
                    worker_id,
                    state: WorkerState::Failed,
                    records_written: 0,
                    records_skipped: 0,
                    warnings: Vec::new(),
                }
            }
        }
    }
}

async fn run(
    worker_id: usize,
    segment: Vec<PriceRecord>,
    connector: Arc<dyn StoreConnector>,
    regions: Arc<RegionMap>,
    state: Arc<Mutex<WorkerState>>,
    stop_rx: watch::Receiver<bool>,
) -> WorkerReport {
    let store = match connector.connect().await {
        Ok(store) => store,
        Err(e) => {
            warn!(worker_id, error = %e, "worker could not open a store handle");
            *state.lock() = WorkerState::Failed;
            return WorkerReport {
                worker_id,
                state: WorkerState::Failed,
                records_written: 0,
                records_skipped: 0,
                warnings: Vec::new(),
            };
        }
    };

    *state.lock() = WorkerState::Running;
    debug!(worker_id, records = segment.len(), "worker running");

    let mut records_written = 0;
    let mut records_skipped = 0;
    let mut warnings = Vec::new();

    for record in &segment {
        // Cooperative stop point: only between records.
        if *stop_rx.borrow() {
            *state.lock() = WorkerState::StopRequested;
            debug!(worker_id, "stop requested, abandoning remaining records");
            break;
        }

        let region_name = match regions.assign_region(&record.availability_zone) {
            Ok(name) => name.to_string(),
            Err(err) => {
                warn!(
                    worker_id,
                    availability_zone = %err.availability_zone,
                    "skipping record: zone matches no configured region"
                );
                records_skipped += 1;
                warnings.push(err);
                continue;
            }
        };

        if let Err(err) = store.put_record(&region_name, record).await {
            warn!(worker_id, error = %err, "skipping record after write failure");
            records_skipped += 1;
            continue;
        }
        records_written += 1;
    }

    *state.lock() = WorkerState::Stopped;
    info!(worker_id, records_written, records_skipped, "worker stopped");

    WorkerReport {
        worker_id,
        state: WorkerState::Stopped,
        records_written,
        records_skipped,
        warnings,
    }
}
