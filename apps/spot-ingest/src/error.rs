//! Run-level error type.
//!
//! Only failures that abort the whole run surface here. Record- and
//! worker-scoped failures degrade to warnings and counters inside the
//! pipeline, and the entry points report window and configuration
//! problems before a run ever starts.

use crate::source::SourceError;
use crate::store::StoreError;

/// Fatal pipeline failure.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Every target region failed to fetch; there is nothing to persist.
    #[error("all {0} target regions failed to fetch")]
    AllRegionsFailed(usize),

    /// The price source client could not be assembled.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The durable store could not be opened at all.
    #[error(transparent)]
    Store(#[from] StoreError),
}
