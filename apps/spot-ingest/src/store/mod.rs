//! Persistence ports: the durable record table and the object store.
//!
//! Workers never share a store handle. The coordinator uses a
//! [`StoreConnector`] to open one handle per worker; a connect failure
//! fails only that worker.

mod memory;
mod object;
mod table;

pub use memory::{InMemoryRecordStore, InMemoryStoreConnector};
pub use object::HttpObjectStore;
pub use table::TableStoreConnector;

use async_trait::async_trait;

use crate::model::PriceRecord;

/// Persistence-layer error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Could not open a store handle.
    #[error("store connection error: {0}")]
    Connection(String),

    /// A single upsert failed. Logged and skipped by workers.
    #[error("failed to write record '{key}': {message}")]
    Write {
        /// Composite key of the record that failed.
        key: String,
        /// Underlying error detail.
        message: String,
    },

    /// An object-store put failed.
    #[error("failed to put object '{key}': {message}")]
    Object {
        /// Object key that failed.
        key: String,
        /// Underlying error detail.
        message: String,
    },
}

/// Port for the durable key-value table.
///
/// Upserts are targeted by the record's composite natural key, so
/// concurrent writers with disjoint records never contend.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Upsert one record, annotated with its derived owning region.
    async fn put_record(&self, region_name: &str, record: &PriceRecord) -> Result<(), StoreError>;
}

/// Factory for per-worker [`RecordStore`] handles.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Open a fresh store handle for one worker.
    async fn connect(&self) -> Result<Box<dyn RecordStore>, StoreError>;
}

/// Port for the whole-document object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `body` under `bucket`/`key`, replacing any existing object.
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError>;
}
