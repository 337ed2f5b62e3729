//! Blob storage for uploaded files.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::StorageError;

/// Path-addressed byte storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `bytes` at `path`, replacing any existing blob.
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Read the blob at `path`.
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Remove the blob at `path`. Returns `false` if it did not exist.
    async fn delete(&self, path: &str) -> Result<bool, StorageError>;
}

/// Blob store backed by a directory on the local filesystem.
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative blob path under the root.
    ///
    /// Only plain components are accepted, so a path can never climb out of
    /// the root or point at an absolute location.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let mut components = relative.components().peekable();
        if components.peek().is_none() {
            return Err(StorageError::InvalidBlobPath(path.to_owned()));
        }
        if !components.all(|c| matches!(c, Component::Normal(_))) {
            return Err(StorageError::InvalidBlobPath(path.to_owned()));
        }
        Ok(self.root.join(relative))
    }
}

fn io_err(path: &str) -> impl FnOnce(std::io::Error) -> StorageError + '_ {
    move |source| StorageError::Blob { path: path.to_owned(), source }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err(path))?;
        }
        tokio::fs::write(&full, bytes).await.map_err(io_err(path))?;
        tracing::debug!(path, size = bytes.len(), "blob written");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound { entity: "blob", id: path.to_owned() })
            },
            Err(e) => Err(io_err(path)(e)),
        }
    }

    async fn delete(&self, path: &str) -> Result<bool, StorageError> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(path)(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store.put("client-1/period-3/sales.csv", b"a,b\n1,2\n").await.unwrap();
        let bytes = store.get("client-1/period-3/sales.csv").await.unwrap();
        assert_eq!(bytes, b"a,b\n1,2\n");

        assert!(store.delete("client-1/period-3/sales.csv").await.unwrap());
        assert!(!store.delete("client-1/period-3/sales.csv").await.unwrap());
        let missing = store.get("client-1/period-3/sales.csv").await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn rejects_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        for bad in ["../escape.csv", "/etc/passwd", "a/../../b", ""] {
            let err = store.put(bad, b"x").await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidBlobPath(_)), "accepted {bad:?}");
        }
    }
}
