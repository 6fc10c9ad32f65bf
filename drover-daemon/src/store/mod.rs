//! Object store layer
//!
//! The object store holds script templates between submission and
//! execution: the CLI uploads a script when a run is submitted, and the
//! executor fetches it back by path when the run is dispatched.
//!
//! Trait-based to enable testing and dependency injection.

mod fs;
mod http;

// Re-export trait and implementations
pub use fs::FsStore;
pub use http::HttpStore;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, ExecutionMode};

/// Errors from object store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {bucket}/{path}")]
    NotFound { bucket: String, path: String },

    #[error("store request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("store returned status {status}: {message}")]
    BadStatus { status: u16, message: String },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable storage of script templates, addressed by bucket and path
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's bytes; `NotFound` if the object is absent
    async fn fetch(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Write an object, replacing any existing content at the path
    async fn put(&self, bucket: &str, path: &str, data: &[u8]) -> Result<(), StoreError>;
}

/// Build the object store matching the configured execution mode
pub fn from_config(config: &Config) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.mode {
        ExecutionMode::Local => Ok(Arc::new(FsStore::new(config.store_root.clone()))),
        ExecutionMode::Cluster => {
            let endpoint = config
                .store_endpoint
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("cluster mode requires a store endpoint"))?;
            Ok(Arc::new(HttpStore::new(endpoint)))
        }
    }
}
