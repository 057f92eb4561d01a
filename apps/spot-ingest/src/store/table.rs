//! Turso-backed durable record table.
//!
//! One `Database` is opened per pipeline run; each worker gets its own
//! `Connection` through the [`StoreConnector`] so handles are never shared.

use async_trait::async_trait;
use tracing::debug;

use super::{RecordStore, StoreConnector, StoreError};
use crate::model::{KEY_TIMESTAMP_FORMAT, PriceRecord};

/// Connector owning the turso database for one run.
pub struct TableStoreConnector {
    db: turso::Database,
    table: String,
}

impl TableStoreConnector {
    /// Open (or create) the local database and ensure the table exists.
    pub async fn open(path: &str, table: &str) -> Result<Self, StoreError> {
        let db = turso::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    record_key TEXT PRIMARY KEY,
                    region_name TEXT NOT NULL,
                    availability_zone TEXT NOT NULL,
                    instance_type TEXT NOT NULL,
                    product_description TEXT NOT NULL,
                    spot_price TEXT NOT NULL,
                    price_timestamp TEXT NOT NULL
                )"
            ),
            (),
        )
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

        debug!(table, path, "durable price table ready");

        Ok(Self {
            db,
            table: table.to_string(),
        })
    }
}

#[async_trait]
impl StoreConnector for TableStoreConnector {
    async fn connect(&self) -> Result<Box<dyn RecordStore>, StoreError> {
        let conn = self
            .db
            .connect()
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Box::new(TableRecordStore {
            conn,
            table: self.table.clone(),
        }))
    }
}

/// One worker's handle onto the durable table.
struct TableRecordStore {
    conn: turso::Connection,
    table: String,
}

#[async_trait]
impl RecordStore for TableRecordStore {
    async fn put_record(&self, region_name: &str, record: &PriceRecord) -> Result<(), StoreError> {
        let key = record.key();
        let sql = format!(
            "INSERT OR REPLACE INTO {} (
                record_key, region_name, availability_zone, instance_type,
                product_description, spot_price, price_timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            self.table
        );

        self.conn
            .execute(
                &sql,
                (
                    key.clone(),
                    region_name.to_string(),
                    record.availability_zone.clone(),
                    record.instance_type.clone(),
                    record.product_description.clone(),
                    record.price.to_string(),
                    record.timestamp.format(KEY_TIMESTAMP_FORMAT).to_string(),
                ),
            )
            .await
            .map_err(|e| StoreError::Write {
                key,
                message: e.to_string(),
            })?;

        Ok(())
    }
}
