//! HTTP object store adapter.
//!
//! Streams whole documents to an S3-compatible endpoint with
//! `PUT {base}/{bucket}/{key}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{ObjectStore, StoreError};

/// HTTP-backed [`ObjectStore`].
#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
}

impl HttpObjectStore {
    /// Build a store against `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        let url = format!("{}/{bucket}/{key}", self.base_url);

        let response = self
            .client
            .put(&url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::Object {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_else(|_| status.to_string());
        Err(StoreError::Object {
            key: key.to_string(),
            message: format!("status {status}: {message}"),
        })
    }
}
