//! In-memory BlobStore implementation

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::storage::traits::BlobStore;
use crate::storage::types::ContentRef;

/// In-memory blob store for testing
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<ContentRef, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blobs held
    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store(&self, data: &[u8]) -> Result<ContentRef> {
        let hash = ContentRef::from_data(data);
        let mut blobs = self.blobs.lock().unwrap();
        blobs.entry(hash.clone()).or_insert_with(|| data.to_vec());
        Ok(hash)
    }

    async fn get(&self, content: &ContentRef) -> Result<Vec<u8>> {
        let blobs = self.blobs.lock().unwrap();
        blobs
            .get(content)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Blob not found: {}", content))
    }

    async fn exists(&self, content: &ContentRef) -> bool {
        self.blobs.lock().unwrap().contains_key(content)
    }

    async fn delete(&self, content: &ContentRef) -> Result<bool> {
        Ok(self.blobs.lock().unwrap().remove(content).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_and_get() {
        let store = MemoryBlobStore::new();
        let data = b"hello world";

        let stored = store.store(data).await.unwrap();
        let retrieved = store.get(&stored).await.unwrap();
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn test_deduplication() {
        let store = MemoryBlobStore::new();
        let data = b"duplicate";

        let first = store.store(data).await.unwrap();
        let second = store.store(data).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryBlobStore::new();
        let stored = store.store(b"delete me").await.unwrap();
        assert!(store.exists(&stored).await);

        assert!(store.delete(&stored).await.unwrap());
        assert!(!store.exists(&stored).await);
        assert!(!store.delete(&stored).await.unwrap());
        assert!(store.get(&stored).await.is_err());
    }
}
