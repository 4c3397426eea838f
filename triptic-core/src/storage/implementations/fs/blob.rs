//! Content-addressed media storage on disk
//!
//! Image and video bytes are stored under their SHA-256 hash, so regenerating
//! identical content or copying a version between screens never duplicates data.

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::storage::traits::BlobStore;
use crate::storage::types::ContentRef;

/// Sharded blob directory: `root/{hash[0:2]}/{hash}`
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    /// Get the filesystem path for a blob
    pub fn path_for(&self, content: &ContentRef) -> PathBuf {
        let hash = content.as_str();
        if hash.len() < 2 {
            return self.root.join(hash);
        }
        self.root.join(&hash[0..2]).join(hash)
    }

    /// Recompute the hash of a stored blob and compare it to its name
    pub async fn verify(&self, content: &ContentRef) -> anyhow::Result<bool> {
        let data = self.get(content).await?;
        Ok(ContentRef::from_data(&data) == *content)
    }

    /// Remove `.tmp` files left behind by interrupted writes
    pub async fn cleanup_temp_files(&self) -> anyhow::Result<usize> {
        let mut cleaned = 0;
        if !fs::try_exists(&self.root).await? {
            return Ok(0);
        }

        let mut shards = fs::read_dir(&self.root).await?;
        while let Some(shard) = shards.next_entry().await? {
            let shard_path = shard.path();
            if !shard_path.is_dir() {
                continue;
            }
            let mut entries = fs::read_dir(&shard_path).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "tmp") {
                    fs::remove_file(&path).await?;
                    cleaned += 1;
                }
            }
        }
        Ok(cleaned)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn store(&self, data: &[u8]) -> anyhow::Result<ContentRef> {
        let content = ContentRef::from_data(data);
        let path = self.path_for(&content);

        if fs::try_exists(&path).await? {
            return Ok(content);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Unique temp name so concurrent writers of the same bytes don't collide
        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, &path).await?;

        tracing::debug!(content = %content, bytes = data.len(), "Stored blob");
        Ok(content)
    }

    async fn get(&self, content: &ContentRef) -> anyhow::Result<Vec<u8>> {
        let path = self.path_for(content);
        fs::read(&path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read blob {}: {}", content, e))
    }

    async fn exists(&self, content: &ContentRef) -> bool {
        fs::try_exists(self.path_for(content)).await.unwrap_or(false)
    }

    async fn delete(&self, content: &ContentRef) -> anyhow::Result<bool> {
        let path = self.path_for(content);
        if fs::try_exists(&path).await? {
            fs::remove_file(&path).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}
