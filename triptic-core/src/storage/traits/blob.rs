//! BlobStore trait for content-addressable binary storage

use anyhow::Result;
use async_trait::async_trait;

use crate::storage::types::ContentRef;

/// Content-addressable blob storage trait
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store binary data and return its content reference
    async fn store(&self, data: &[u8]) -> Result<ContentRef>;

    /// Retrieve blob data by reference
    async fn get(&self, content: &ContentRef) -> Result<Vec<u8>>;

    /// Check if a blob exists
    async fn exists(&self, content: &ContentRef) -> bool;

    /// Delete a blob by reference
    ///
    /// Returns Ok(true) if deleted, Ok(false) if didn't exist
    async fn delete(&self, content: &ContentRef) -> Result<bool>;
}
