//! Storage types
//!
//! Shared types used by storage traits, the registry and the display layer.

pub mod asset_group;
pub mod blob;
pub mod playlist;
pub mod screen;
pub mod version;

// Re-exports for convenience
pub use asset_group::AssetGroup;
pub use blob::ContentRef;
pub use playlist::{DisplayLock, Playlist};
pub use screen::Screen;
pub use version::{AssetVersion, MediaKind, NewVersion, VersionOrigin, VersionSource};
