//! Storage trait definitions
//!
//! All storage traits are defined here, with implementations in `implementations/`.

mod blob;
mod group;
mod playlist;
mod settings;

pub use blob::BlobStore;
pub use group::GroupStore;
pub use playlist::PlaylistStore;
pub use settings::SettingsStore;

use std::sync::Arc;

/// Bundles all storage type associations into a single trait.
///
/// ```ignore
/// pub struct AppStorage;
///
/// impl StorageTypes for AppStorage {
///     type Blob = FsBlobStore;
///     type Group = SqliteStore;
///     type Playlist = SqliteStore;
///     type Settings = SqliteStore;
/// }
///
/// type AppTriptic = Triptic<AppStorage>;
/// ```
pub trait StorageTypes: Send + Sync + 'static {
    /// Content-addressed media bytes
    type Blob: BlobStore + Send + Sync + 'static;
    /// Asset groups and version histories
    type Group: GroupStore + Send + Sync + 'static;
    /// Playlists
    type Playlist: PlaylistStore + Send + Sync + 'static;
    /// Display lock and selected playlist
    type Settings: SettingsStore + Send + Sync + 'static;
}

/// Provides access to store instances.
///
/// Implementations may share one underlying store (e.g. a single `SqliteStore`)
/// across several accessors.
pub trait Stores<S: StorageTypes>: Send + Sync {
    fn blob(&self) -> Arc<S::Blob>;
    fn group(&self) -> Arc<S::Group>;
    fn playlist(&self) -> Arc<S::Playlist>;
    fn settings(&self) -> Arc<S::Settings>;
}
