//! HTTP object store client
//!
//! Talks to an S3-style object store over plain HTTP: objects are fetched
//! with `GET {endpoint}/{bucket}/{path}` and written with `PUT`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use super::{ObjectStore, StoreError};

/// Object store client against an HTTP endpoint
#[derive(Debug, Clone)]
pub struct HttpStore {
    base_url: String,
    client: Client,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, bucket, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ObjectStore for HttpStore {
    async fn fetch(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StoreError> {
        let url = self.object_url(bucket, path);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            });
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::BadStatus { status, message });
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn put(&self, bucket: &str, path: &str, data: &[u8]) -> Result<(), StoreError> {
        let url = self.object_url(bucket, path);
        let response = self.client.put(&url).body(data.to_vec()).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StoreError::BadStatus { status, message });
        }

        Ok(())
    }
}
