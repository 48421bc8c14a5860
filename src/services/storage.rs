// Byte storage for uploaded documents

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::utils::service_error::ServiceError;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for ServiceError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound(_) => ServiceError::NotFound("Document content"),
            other => ServiceError::StorageError(other.to_string()),
        }
    }
}

/// Where document bytes live. Keys are relative, `/`-separated paths.
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Removing a missing key is not an error
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Stores objects as plain files under a root directory
#[derive(Debug, Clone)]
pub struct LocalFsStorage {
    root: PathBuf,
}

impl LocalFsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DocumentStorage for LocalFsStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        debug!(key, size = bytes.len(), "Stored object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            },
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_storage() -> (LocalFsStorage, PathBuf) {
        let root = std::env::temp_dir().join(format!("profitum-storage-{}", Uuid::new_v4()));
        (LocalFsStorage::new(&root), root)
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let (storage, root) = temp_storage();

        storage.put("clients/abc/kbis.pdf", b"%PDF-1.4").await.unwrap();
        assert_eq!(storage.get("clients/abc/kbis.pdf").await.unwrap(), b"%PDF-1.4");

        storage.delete("clients/abc/kbis.pdf").await.unwrap();
        assert!(matches!(
            storage.get("clients/abc/kbis.pdf").await,
            Err(StorageError::NotFound(_))
        ));
        storage.delete("clients/abc/kbis.pdf").await.unwrap();

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let (storage, _root) = temp_storage();
        assert!(matches!(
            storage.put("../outside", b"x").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            storage.get("/etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(storage.get("").await.is_err());
    }
}
