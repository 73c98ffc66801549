use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use crate::{config::RetryConfig, utils::retry_with_backoff};

/// Read-only blob storage, fetched by key. Templates live here.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, Error>;
}

pub struct HttpBlobStore {
    http_client: Client,
    base_url: String,
    retry_config: RetryConfig,
}

impl HttpBlobStore {
    pub fn new(base_url: &str, retry_config: RetryConfig) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(base_url, "Blob store client initialized");

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_config,
        })
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>, Error> {
        let url = format!("{}/{}", self.base_url, key);

        debug!(key, "Fetching blob");

        retry_with_backoff(&self.retry_config, || {
            let client = self.http_client.clone();
            let url = url.clone();

            async move {
                let response = client.get(&url).send().await.map_err(|e| e.to_string())?;

                let status = response.status();

                if status.is_success() {
                    response
                        .bytes()
                        .await
                        .map(|bytes| bytes.to_vec())
                        .map_err(|e| format!("Failed to read blob body: {}", e))
                } else {
                    Err(format!("Blob store returned status {}", status))
                }
            }
        })
        .await
        .map_err(|e| anyhow!("Failed to fetch blob {}: {}", key, e))
    }
}
