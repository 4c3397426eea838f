//! GroupStore trait for durable asset group snapshots

use anyhow::Result;
use async_trait::async_trait;

use crate::storage::ids::AssetGroupId;
use crate::storage::types::AssetGroup;

/// Persistence for asset groups and their per-screen histories.
///
/// The registry is the source of truth while running; it writes a full group
/// snapshot through this trait after every mutation and reads everything back
/// once at startup.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Load every persisted group
    async fn load_groups(&self) -> Result<Vec<AssetGroup>>;

    /// Insert or replace a group snapshot
    async fn save_group(&self, group: &AssetGroup) -> Result<()>;

    /// Delete a group and all its versions
    ///
    /// Returns Ok(true) if deleted, Ok(false) if didn't exist
    async fn delete_group(&self, id: &AssetGroupId) -> Result<bool>;

    /// Replace the group stored under `old` with `renamed` in one step
    async fn rename_group(&self, old: &AssetGroupId, renamed: &AssetGroup) -> Result<()>;
}
