//! Artifact writer: run outputs to local files or the object store.
//!
//! Writes never abort the pipeline. Each write reports success or failure
//! as a boolean so sibling artifacts still get their chance; the failure
//! detail goes to the log.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::store::ObjectStore;
use crate::window::TimeWindow;

/// Object key for one region's full price dump.
///
/// `<region>/<start>_<end>_all-instance-spot-prices.json`, endpoints in
/// the canonical file-naming form.
#[must_use]
pub fn prices_key(region: &str, window: &TimeWindow) -> String {
    let (start, end) = window.file_stamps();
    format!("{region}/{start}_{end}_all-instance-spot-prices.json")
}

/// Object key for the run's unique instance-type list.
///
/// `<end-date>_spot-instanceTypes.json`.
#[must_use]
pub fn instance_types_key(window: &TimeWindow) -> String {
    format!("{}_spot-instanceTypes.json", window.end.format("%Y-%m-%d"))
}

/// Where one artifact goes.
pub enum Destination<'a> {
    /// A file under `dir`; parent directories are created as needed.
    LocalFile {
        /// Root directory for run artifacts.
        dir: &'a Path,
        /// File name, possibly with a region prefix path.
        key: &'a str,
    },
    /// An object-store put.
    Blob {
        /// Object store to write through.
        store: &'a dyn ObjectStore,
        /// Target bucket.
        bucket: &'a str,
        /// Object key.
        key: &'a str,
    },
}

/// Serialize `document` and deliver it to `destination`.
///
/// Human-readable pretty JSON, schema-stable field order. Returns whether
/// the write succeeded; failures are logged, never raised.
pub async fn write<T: Serialize + Sync>(document: &T, destination: Destination<'_>) -> bool {
    let body = match serde_json::to_vec_pretty(document) {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "artifact serialization failed");
            return false;
        }
    };

    match destination {
        Destination::LocalFile { dir, key } => {
            let path = dir.join(key);
            if let Some(parent) = path.parent() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    warn!(path = %path.display(), error = %e, "artifact directory creation failed");
                    return false;
                }
            }
            match tokio::fs::write(&path, &body).await {
                Ok(()) => {
                    info!(path = %path.display(), bytes = body.len(), "artifact written");
                    true
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "artifact write failed");
                    false
                }
            }
        }
        Destination::Blob { store, bucket, key } => {
            match store.put_object(bucket, key, body).await {
                Ok(()) => {
                    info!(bucket, key, "artifact uploaded");
                    true
                }
                Err(e) => {
                    warn!(bucket, key, error = %e, "artifact upload failed");
                    false
                }
            }
        }
    }
}
