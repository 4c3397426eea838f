//! Filesystem storage implementations

mod blob;

pub use blob::FsBlobStore;
