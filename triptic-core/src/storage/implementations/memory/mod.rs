//! In-memory storage implementations
//!
//! These implementations keep everything in process memory and are useful for
//! unit tests and for running without a database.

mod blob;
mod group;
mod playlist;
mod settings;

pub use blob::MemoryBlobStore;
pub use group::MemoryGroupStore;
pub use playlist::MemoryPlaylistStore;
pub use settings::MemorySettingsStore;

use std::sync::Arc;

use crate::storage::traits::{StorageTypes, Stores};

/// Storage bundle backed entirely by memory
pub struct MemoryStorage;

impl StorageTypes for MemoryStorage {
    type Blob = MemoryBlobStore;
    type Group = MemoryGroupStore;
    type Playlist = MemoryPlaylistStore;
    type Settings = MemorySettingsStore;
}

/// Shared handles to a fresh set of memory stores
#[derive(Clone, Default)]
pub struct MemoryStores {
    blob: Arc<MemoryBlobStore>,
    group: Arc<MemoryGroupStore>,
    playlist: Arc<MemoryPlaylistStore>,
    settings: Arc<MemorySettingsStore>,
}

impl MemoryStores {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Stores<MemoryStorage> for MemoryStores {
    fn blob(&self) -> Arc<MemoryBlobStore> {
        self.blob.clone()
    }

    fn group(&self) -> Arc<MemoryGroupStore> {
        self.group.clone()
    }

    fn playlist(&self) -> Arc<MemoryPlaylistStore> {
        self.playlist.clone()
    }

    fn settings(&self) -> Arc<MemorySettingsStore> {
        self.settings.clone()
    }
}
