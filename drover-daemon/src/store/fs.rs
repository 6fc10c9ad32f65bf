//! Filesystem-backed object store
//!
//! Used in local mode and in tests. Objects live under
//! `<root>/<bucket>/<path>`.

use async_trait::async_trait;
use std::path::PathBuf;

use super::{ObjectStore, StoreError};

/// Object store rooted at a local directory
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, path: &str) -> PathBuf {
        self.root.join(bucket).join(path)
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn fetch(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StoreError> {
        match tokio::fs::read(self.object_path(bucket, path)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                path: path.to_string(),
            }),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn put(&self, bucket: &str, path: &str, data: &[u8]) -> Result<(), StoreError> {
        let full = self.object_path(bucket, path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, data).await?;

        tracing::debug!("Stored object at {}", full.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        store
            .put("models", "scripts/train.py", b"print('hi')")
            .await
            .unwrap();

        let bytes = store.fetch("models", "scripts/train.py").await.unwrap();
        assert_eq!(bytes, b"print('hi')");
    }

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());

        let err = store.fetch("models", "nope.py").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }
}
