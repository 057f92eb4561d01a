//! In-memory record store for testing and dry runs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{RecordStore, StoreConnector, StoreError};
use crate::model::PriceRecord;

/// Stored row: derived region plus the record itself.
type Row = (String, PriceRecord);

/// In-memory implementation of [`RecordStore`].
///
/// Suitable for testing and development. Not for production use.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    rows: Arc<RwLock<HashMap<String, Row>>>,
    fail_keys: Arc<HashSet<String>>,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make writes for the given composite keys fail (for test setup).
    #[must_use]
    pub fn with_failing_keys(mut self, keys: impl IntoIterator<Item = String>) -> Self {
        self.fail_keys = Arc::new(keys.into_iter().collect());
        self
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Whether a record with this composite key was written.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.rows.read().contains_key(key)
    }

    /// The derived region stored for a key, if present.
    #[must_use]
    pub fn region_of(&self, key: &str) -> Option<String> {
        self.rows.read().get(key).map(|(region, _)| region.clone())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn put_record(&self, region_name: &str, record: &PriceRecord) -> Result<(), StoreError> {
        let key = record.key();
        if self.fail_keys.contains(&key) {
            return Err(StoreError::Write {
                key,
                message: "injected failure".to_string(),
            });
        }
        self.rows
            .write()
            .insert(key, (region_name.to_string(), record.clone()));
        Ok(())
    }
}

/// Connector handing out clones of one shared in-memory store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStoreConnector {
    store: InMemoryRecordStore,
    fail_connect: bool,
}

impl InMemoryStoreConnector {
    /// Connector backed by `store`.
    #[must_use]
    pub fn new(store: InMemoryRecordStore) -> Self {
        Self {
            store,
            fail_connect: false,
        }
    }

    /// Make every `connect` call fail (for test setup).
    #[must_use]
    pub const fn failing(mut self) -> Self {
        self.fail_connect = true;
        self
    }
}

#[async_trait]
impl StoreConnector for InMemoryStoreConnector {
    async fn connect(&self) -> Result<Box<dyn RecordStore>, StoreError> {
        if self.fail_connect {
            return Err(StoreError::Connection("injected failure".to_string()));
        }
        Ok(Box::new(self.store.clone()))
    }
}
