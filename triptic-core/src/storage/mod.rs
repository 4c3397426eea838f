//! Storage layer
//!
//! - `ids` - typed identifiers
//! - `types` - persisted domain records (groups, versions, playlists)
//! - `traits` - async persistence traits bundled by `StorageTypes`
//! - `implementations` - memory, filesystem, and SQLite backends

pub mod helper;
pub mod ids;
pub mod implementations;
pub mod traits;
pub mod types;

pub use ids::{AssetGroupId, JobId, PlaylistId};
pub use implementations::fs::FsBlobStore;
pub use implementations::memory::{
    MemoryBlobStore, MemoryGroupStore, MemoryPlaylistStore, MemorySettingsStore, MemoryStorage,
    MemoryStores,
};
#[cfg(feature = "sqlite")]
pub use implementations::sqlite::{SqliteStorage, SqliteStore, SqliteStores};
pub use traits::{BlobStore, GroupStore, PlaylistStore, SettingsStore, StorageTypes, Stores};
