//! SQLite storage backend
//!
//! Provides `SqliteStore`, a shared SQLite connection that implements the
//! metadata traits. Media bytes stay in a `BlobStore`; rows only carry their
//! content references.
//!
//! Trait implementations live in submodules:
//! - `group` - GroupStore impl (asset groups, screens, versions)
//! - `playlist` - PlaylistStore impl
//! - `settings` - SettingsStore impl (JSON values keyed by name)

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::storage::implementations::fs::FsBlobStore;
use crate::storage::traits::{StorageTypes, Stores};

mod group;
mod playlist;
mod settings;

pub(crate) use group::init_schema as init_group_schema;
pub(crate) use playlist::init_schema as init_playlist_schema;
pub(crate) use settings::init_schema as init_settings_schema;

/// Shared SQLite connection
///
/// Create one store and share it via `Arc` across the registry, the display
/// context, and anything else that needs database access.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(&path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite database (useful for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Get access to the connection (for trait implementations)
    pub fn conn(&self) -> &Arc<Mutex<Connection>> {
        &self.conn
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        init_group_schema(&conn)?;
        init_playlist_schema(&conn)?;
        init_settings_schema(&conn)?;
        Ok(())
    }
}

/// SQLite for metadata, filesystem CAS for media
pub struct SqliteStorage;

impl StorageTypes for SqliteStorage {
    type Blob = FsBlobStore;
    type Group = SqliteStore;
    type Playlist = SqliteStore;
    type Settings = SqliteStore;
}

#[derive(Clone)]
pub struct SqliteStores {
    sqlite: Arc<SqliteStore>,
    blob: Arc<FsBlobStore>,
}

impl SqliteStores {
    pub fn new(sqlite: Arc<SqliteStore>, blob: Arc<FsBlobStore>) -> Self {
        Self { sqlite, blob }
    }
}

impl Stores<SqliteStorage> for SqliteStores {
    fn blob(&self) -> Arc<FsBlobStore> {
        self.blob.clone()
    }

    fn group(&self) -> Arc<SqliteStore> {
        self.sqlite.clone()
    }

    fn playlist(&self) -> Arc<SqliteStore> {
        self.sqlite.clone()
    }

    fn settings(&self) -> Arc<SqliteStore> {
        self.sqlite.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_store_create() {
        let store = SqliteStore::in_memory().unwrap();
        let conn = store.conn().lock().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN \
                 ('asset_groups', 'screens', 'asset_versions', 'playlists', 'playlist_items', 'settings')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 6);
    }
}
