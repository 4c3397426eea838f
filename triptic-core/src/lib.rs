//! Core library for triptic, a three-screen display system
//!
//! This crate provides:
//! - **Storage**: typed ids, records, async storage traits and memory/fs/SQLite backends
//! - **Versions**: `VersionStore` per screen and the `AssetGroupRegistry` over them
//! - **Generation**: `GenerationQueue` driving an external `Generator`
//! - **Display**: `DisplayContext` and the time-based `PlaylistRotator`
//! - **Engine**: `Triptic`, which wires the above together
//!
//! # Example
//!
//! ```ignore
//! use triptic_core::{EngineConfig, PlaceholderGenerator, Triptic};
//! use triptic_core::storage::{MemoryStorage, MemoryStores};
//!
//! let stores = MemoryStores::new();
//! let triptic: Triptic<MemoryStorage> =
//!     Triptic::open(&stores, Arc::new(PlaceholderGenerator::new()), EngineConfig::default()).await?;
//! let group = triptic.create_asset_group("animals/cat").await?;
//! ```

pub mod display;
pub mod engine;
pub mod error;
pub mod generation;
pub mod imaging;
pub mod registry;
pub mod storage;
pub mod version_store;

pub use display::{DisplayContext, Heartbeat, PlaylistRotator};
pub use engine::{DisplayItem, EngineConfig, ScreenContent, Status, Triptic};
pub use error::{Result, TripticError};
pub use generation::{
    CancelReport, GenerationJob, GenerationQueue, GenerationRequest, Generator, JobKind, JobState,
    JobTarget, PlaceholderGenerator, QueueConfig,
};
pub use registry::AssetGroupRegistry;
pub use storage::ids::{AssetGroupId, JobId, PlaylistId};
pub use storage::types::{
    AssetGroup, AssetVersion, ContentRef, DisplayLock, MediaKind, Playlist, Screen, VersionOrigin,
};
pub use version_store::VersionStore;
