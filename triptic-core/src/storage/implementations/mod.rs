//! Storage implementations
//!
//! This module contains concrete implementations of the storage traits.
//!
//! ## Available Implementations
//!
//! - `sqlite/` - SQLite-based metadata storage (requires `sqlite` feature)
//! - `memory/` - In-memory storage for testing and ephemeral runs
//! - `fs/` - Filesystem-based blob storage

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub mod fs;
pub mod memory;
