//! In-memory PlaylistStore implementation

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::storage::ids::PlaylistId;
use crate::storage::traits::PlaylistStore;
use crate::storage::types::Playlist;

#[derive(Debug, Default)]
pub struct MemoryPlaylistStore {
    playlists: Mutex<HashMap<PlaylistId, Playlist>>,
}

impl MemoryPlaylistStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlaylistStore for MemoryPlaylistStore {
    async fn load_playlists(&self) -> Result<Vec<Playlist>> {
        let mut playlists: Vec<Playlist> =
            self.playlists.lock().unwrap().values().cloned().collect();
        playlists.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(playlists)
    }

    async fn save_playlist(&self, playlist: &Playlist) -> Result<()> {
        self.playlists
            .lock()
            .unwrap()
            .insert(playlist.id.clone(), playlist.clone());
        Ok(())
    }

    async fn delete_playlist(&self, id: &PlaylistId) -> Result<bool> {
        Ok(self.playlists.lock().unwrap().remove(id).is_some())
    }

    async fn rename_playlist(&self, old: &PlaylistId, renamed: &Playlist) -> Result<()> {
        let mut playlists = self.playlists.lock().unwrap();
        playlists.remove(old);
        playlists.insert(renamed.id.clone(), renamed.clone());
        Ok(())
    }
}
