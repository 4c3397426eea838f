//! PlaylistStore trait for durable playlists

use anyhow::Result;
use async_trait::async_trait;

use crate::storage::ids::PlaylistId;
use crate::storage::types::Playlist;

#[async_trait]
pub trait PlaylistStore: Send + Sync {
    /// Load every persisted playlist
    async fn load_playlists(&self) -> Result<Vec<Playlist>>;

    /// Insert or replace a playlist, including its item order
    async fn save_playlist(&self, playlist: &Playlist) -> Result<()>;

    /// Returns Ok(true) if deleted, Ok(false) if didn't exist
    async fn delete_playlist(&self, id: &PlaylistId) -> Result<bool>;

    /// Replace the playlist stored under `old` with `renamed` in one step
    async fn rename_playlist(&self, old: &PlaylistId, renamed: &Playlist) -> Result<()>;
}
