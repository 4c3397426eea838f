//! SQLite implementation of PlaylistStore

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, Transaction};

use super::SqliteStore;
use crate::storage::ids::{AssetGroupId, PlaylistId};
use crate::storage::traits::PlaylistStore;
use crate::storage::types::Playlist;

pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Playlists
        CREATE TABLE IF NOT EXISTS playlists (
            id TEXT PRIMARY KEY,
            interval_secs INTEGER,
            created_at INTEGER NOT NULL
        );

        -- Ordered playlist membership
        CREATE TABLE IF NOT EXISTS playlist_items (
            playlist_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            group_id TEXT NOT NULL,
            PRIMARY KEY (playlist_id, position)
        );
        CREATE INDEX IF NOT EXISTS idx_playlist_items_group ON playlist_items(group_id);
        "#,
    )
    .context("Failed to initialize playlist schema")?;
    Ok(())
}

fn delete_rows(tx: &Transaction<'_>, id: &PlaylistId) -> Result<usize> {
    tx.execute("DELETE FROM playlist_items WHERE playlist_id = ?1", params![id])?;
    Ok(tx.execute("DELETE FROM playlists WHERE id = ?1", params![id])?)
}

fn write_rows(tx: &Transaction<'_>, playlist: &Playlist) -> Result<()> {
    tx.execute(
        "INSERT INTO playlists (id, interval_secs, created_at) VALUES (?1, ?2, ?3)",
        params![
            playlist.id,
            playlist.interval_secs.map(|s| s as i64),
            playlist.created_at
        ],
    )?;
    let mut stmt = tx.prepare_cached(
        "INSERT INTO playlist_items (playlist_id, position, group_id) VALUES (?1, ?2, ?3)",
    )?;
    for (position, group) in playlist.items.iter().enumerate() {
        stmt.execute(params![playlist.id, position as i64, group])?;
    }
    Ok(())
}

#[async_trait]
impl PlaylistStore for SqliteStore {
    async fn load_playlists(&self) -> Result<Vec<Playlist>> {
        let conn = self.conn().lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, interval_secs, created_at FROM playlists ORDER BY id")?;
        let heads = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, PlaylistId>(0)?,
                    row.get::<_, Option<i64>>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut items_stmt = conn.prepare_cached(
            "SELECT group_id FROM playlist_items WHERE playlist_id = ?1 ORDER BY position",
        )?;
        let mut playlists = Vec::with_capacity(heads.len());
        for (id, interval, created_at) in heads {
            let items = items_stmt
                .query_map(params![id], |row| row.get::<_, AssetGroupId>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let mut playlist = Playlist::new(id, created_at).with_items(items);
            playlist.interval_secs = interval.map(|s| s as u64);
            playlists.push(playlist);
        }
        Ok(playlists)
    }

    async fn save_playlist(&self, playlist: &Playlist) -> Result<()> {
        let mut conn = self.conn().lock().unwrap();
        let tx = conn.transaction()?;
        delete_rows(&tx, &playlist.id)?;
        write_rows(&tx, playlist)?;
        tx.commit()?;
        Ok(())
    }

    async fn delete_playlist(&self, id: &PlaylistId) -> Result<bool> {
        let mut conn = self.conn().lock().unwrap();
        let tx = conn.transaction()?;
        let deleted = delete_rows(&tx, id)?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    async fn rename_playlist(&self, old: &PlaylistId, renamed: &Playlist) -> Result<()> {
        let mut conn = self.conn().lock().unwrap();
        let tx = conn.transaction()?;
        delete_rows(&tx, old)?;
        delete_rows(&tx, &renamed.id)?;
        write_rows(&tx, renamed)?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letters() -> Playlist {
        Playlist::new(PlaylistId::from_string("letters"), 5)
            .with_items(vec![
                AssetGroupId::from_string("c"),
                AssetGroupId::from_string("a"),
                AssetGroupId::from_string("b"),
            ])
            .with_interval(600)
    }

    #[tokio::test]
    async fn test_roundtrip_keeps_order() {
        let store = SqliteStore::in_memory().unwrap();
        let playlist = letters();
        store.save_playlist(&playlist).await.unwrap();

        let loaded = store.load_playlists().await.unwrap();
        assert_eq!(loaded, vec![playlist]);
    }

    #[tokio::test]
    async fn test_rename_moves_items() {
        let store = SqliteStore::in_memory().unwrap();
        let playlist = letters();
        store.save_playlist(&playlist).await.unwrap();

        let mut renamed = playlist.clone();
        renamed.id = PlaylistId::from_string("alphabet");
        store.rename_playlist(&playlist.id, &renamed).await.unwrap();

        let loaded = store.load_playlists().await.unwrap();
        assert_eq!(loaded, vec![renamed.clone()]);
        assert!(store.delete_playlist(&renamed.id).await.unwrap());
        assert!(store.load_playlists().await.unwrap().is_empty());
    }
}
