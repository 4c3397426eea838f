//! SQLite implementation of GroupStore

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

use super::SqliteStore;
use crate::storage::ids::AssetGroupId;
use crate::storage::traits::GroupStore;
use crate::storage::types::{
    AssetGroup, AssetVersion, ContentRef, MediaKind, Screen, VersionOrigin, VersionSource,
};
use crate::version_store::VersionStore;

pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Asset groups
        CREATE TABLE IF NOT EXISTS asset_groups (
            id TEXT PRIMARY KEY,
            created_at INTEGER NOT NULL
        );

        -- Per-screen current pointer and version counter
        CREATE TABLE IF NOT EXISTS screens (
            group_id TEXT NOT NULL,
            screen TEXT NOT NULL CHECK (screen IN ('left', 'center', 'right')),
            current_version INTEGER,
            next_version INTEGER NOT NULL DEFAULT 1,
            PRIMARY KEY (group_id, screen)
        );

        -- Version history
        CREATE TABLE IF NOT EXISTS asset_versions (
            group_id TEXT NOT NULL,
            screen TEXT NOT NULL,
            version_number INTEGER NOT NULL,
            content_ref TEXT NOT NULL,
            prompt TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            media TEXT NOT NULL DEFAULT 'image',
            origin TEXT NOT NULL,
            derived_screen TEXT,
            derived_version INTEGER,
            PRIMARY KEY (group_id, screen, version_number)
        );
        CREATE INDEX IF NOT EXISTS idx_asset_versions_content ON asset_versions(content_ref);
        "#,
    )
    .context("Failed to initialize asset group schema")?;
    Ok(())
}

fn media_str(media: MediaKind) -> &'static str {
    match media {
        MediaKind::Image => "image",
        MediaKind::Video => "video",
    }
}

fn parse_media(s: &str) -> Result<MediaKind> {
    match s {
        "image" => Ok(MediaKind::Image),
        "video" => Ok(MediaKind::Video),
        other => anyhow::bail!("Unknown media kind: {}", other),
    }
}

fn parse_screen(s: &str) -> Result<Screen> {
    s.parse::<Screen>().map_err(|e| anyhow::anyhow!(e))
}

fn delete_rows(tx: &Transaction<'_>, id: &AssetGroupId) -> Result<usize> {
    tx.execute("DELETE FROM asset_versions WHERE group_id = ?1", params![id])?;
    tx.execute("DELETE FROM screens WHERE group_id = ?1", params![id])?;
    let deleted = tx.execute("DELETE FROM asset_groups WHERE id = ?1", params![id])?;
    Ok(deleted)
}

fn write_rows(tx: &Transaction<'_>, group: &AssetGroup) -> Result<()> {
    tx.execute(
        "INSERT INTO asset_groups (id, created_at) VALUES (?1, ?2)",
        params![group.id, group.created_at],
    )?;

    for (screen, store) in group.iter() {
        tx.execute(
            "INSERT INTO screens (group_id, screen, current_version, next_version)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                group.id,
                screen.as_str(),
                store.current_number().map(|n| n as i64),
                store.next_version() as i64
            ],
        )?;

        let mut stmt = tx.prepare_cached(
            "INSERT INTO asset_versions
             (group_id, screen, version_number, content_ref, prompt, created_at,
              media, origin, derived_screen, derived_version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for v in store.versions() {
            stmt.execute(params![
                group.id,
                screen.as_str(),
                v.version_number as i64,
                v.content_ref.as_str(),
                v.prompt,
                v.created_at,
                media_str(v.media),
                v.origin.as_str(),
                v.derived_from.map(|d| d.screen.as_str()),
                v.derived_from.map(|d| d.version as i64),
            ])?;
        }
    }
    Ok(())
}

struct VersionRow {
    screen: String,
    version_number: i64,
    content_ref: String,
    prompt: String,
    created_at: i64,
    media: String,
    origin: String,
    derived_screen: Option<String>,
    derived_version: Option<i64>,
}

impl VersionRow {
    fn into_version(self) -> Result<(Screen, AssetVersion)> {
        let derived_from = match (self.derived_screen, self.derived_version) {
            (Some(screen), Some(version)) => Some(VersionSource {
                screen: parse_screen(&screen)?,
                version: version as u64,
            }),
            _ => None,
        };
        let origin = self
            .origin
            .parse::<VersionOrigin>()
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok((
            parse_screen(&self.screen)?,
            AssetVersion {
                version_number: self.version_number as u64,
                content_ref: ContentRef::from_string(self.content_ref),
                prompt: self.prompt,
                created_at: self.created_at,
                media: parse_media(&self.media)?,
                origin,
                derived_from,
            },
        ))
    }
}

fn load_group(conn: &Connection, id: AssetGroupId, created_at: i64) -> Result<AssetGroup> {
    let mut pointers: [(Option<u64>, u64); 3] = [(None, 1); 3];
    let mut stmt = conn.prepare_cached(
        "SELECT screen, current_version, next_version FROM screens WHERE group_id = ?1",
    )?;
    let rows = stmt.query_map(params![id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<i64>>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;
    for row in rows {
        let (screen, current, next) = row?;
        pointers[parse_screen(&screen)?.index()] = (current.map(|n| n as u64), next as u64);
    }

    let mut histories: [Vec<AssetVersion>; 3] = Default::default();
    let mut stmt = conn.prepare_cached(
        "SELECT screen, version_number, content_ref, prompt, created_at, media, origin,
                derived_screen, derived_version
         FROM asset_versions WHERE group_id = ?1
         ORDER BY screen, version_number",
    )?;
    let rows = stmt.query_map(params![id], |row| {
        Ok(VersionRow {
            screen: row.get(0)?,
            version_number: row.get(1)?,
            content_ref: row.get(2)?,
            prompt: row.get(3)?,
            created_at: row.get(4)?,
            media: row.get(5)?,
            origin: row.get(6)?,
            derived_screen: row.get(7)?,
            derived_version: row.get(8)?,
        })
    })?;
    for row in rows {
        let (screen, version) = row?.into_version()?;
        histories[screen.index()].push(version);
    }

    let [left, center, right] = histories;
    let build = |screen: Screen, versions: Vec<AssetVersion>| {
        let (current, next) = pointers[screen.index()];
        VersionStore::from_parts(versions, current, next)
            .with_context(|| format!("Corrupt history for {}/{}", id, screen))
    };
    let screens = [
        build(Screen::Left, left)?,
        build(Screen::Center, center)?,
        build(Screen::Right, right)?,
    ];
    Ok(AssetGroup::from_screens(id, created_at, screens))
}

#[async_trait]
impl GroupStore for SqliteStore {
    async fn load_groups(&self) -> Result<Vec<AssetGroup>> {
        let conn = self.conn().lock().unwrap();
        let heads: Vec<(AssetGroupId, i64)> = {
            let mut stmt = conn.prepare("SELECT id, created_at FROM asset_groups ORDER BY id")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        heads
            .into_iter()
            .map(|(id, created_at)| load_group(&conn, id, created_at))
            .collect()
    }

    async fn save_group(&self, group: &AssetGroup) -> Result<()> {
        let mut conn = self.conn().lock().unwrap();
        let tx = conn.transaction()?;
        delete_rows(&tx, &group.id)?;
        write_rows(&tx, group)?;
        tx.commit()?;
        Ok(())
    }

    async fn delete_group(&self, id: &AssetGroupId) -> Result<bool> {
        let mut conn = self.conn().lock().unwrap();
        let tx = conn.transaction()?;
        let deleted = delete_rows(&tx, id)?;
        tx.commit()?;
        Ok(deleted > 0)
    }

    async fn rename_group(&self, old: &AssetGroupId, renamed: &AssetGroup) -> Result<()> {
        let mut conn = self.conn().lock().unwrap();
        let tx = conn.transaction()?;
        let taken: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM asset_groups WHERE id = ?1",
                params![renamed.id],
                |row| row.get(0),
            )
            .optional()?;
        if taken.is_some() {
            anyhow::bail!("Asset group already stored: {}", renamed.id);
        }
        delete_rows(&tx, old)?;
        write_rows(&tx, renamed)?;
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::NewVersion;

    fn sample_group(name: &str) -> AssetGroup {
        let mut group = AssetGroup::new(AssetGroupId::from_string(name), 1_000);
        let left = group.screen_mut(Screen::Left);
        left.push(
            NewVersion::new(ContentRef::from_data(b"l1"), "a red fox", VersionOrigin::Generate),
            1_001,
        );
        left.push(
            NewVersion::new(ContentRef::from_data(b"l2"), "a red fox", VersionOrigin::Flip)
                .derived_from(Screen::Left, 1),
            1_002,
        );
        left.set_current(1).unwrap();
        left.delete(2).unwrap();
        group.screen_mut(Screen::Right).push(
            NewVersion::new(ContentRef::from_data(b"v"), "", VersionOrigin::Video)
                .with_media(MediaKind::Video),
            1_003,
        );
        group
    }

    #[tokio::test]
    async fn test_save_and_load_preserves_counters() {
        let store = SqliteStore::in_memory().unwrap();
        let group = sample_group("animals/fox");
        store.save_group(&group).await.unwrap();

        let loaded = store.load_groups().await.unwrap();
        assert_eq!(loaded, vec![group.clone()]);
        // deleted version 2 must not be handed out again
        assert_eq!(loaded[0].screen(Screen::Left).next_version(), 3);
        assert!(loaded[0].screen(Screen::Center).is_empty());
    }

    #[tokio::test]
    async fn test_save_replaces_snapshot() {
        let store = SqliteStore::in_memory().unwrap();
        let mut group = sample_group("g");
        store.save_group(&group).await.unwrap();

        group.swap_screens(Screen::Left, Screen::Right);
        store.save_group(&group).await.unwrap();

        let loaded = store.load_groups().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], group);
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let store = SqliteStore::in_memory().unwrap();
        let group = sample_group("old");
        store.save_group(&group).await.unwrap();
        store.save_group(&sample_group("taken")).await.unwrap();

        let mut renamed = group.clone();
        renamed.id = AssetGroupId::from_string("taken");
        assert!(store.rename_group(&group.id, &renamed).await.is_err());

        renamed.id = AssetGroupId::from_string("new");
        store.rename_group(&group.id, &renamed).await.unwrap();
        let ids: Vec<String> = store
            .load_groups()
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.id.into_string())
            .collect();
        assert_eq!(ids, vec!["new".to_string(), "taken".to_string()]);

        assert!(store.delete_group(&renamed.id).await.unwrap());
        assert!(!store.delete_group(&renamed.id).await.unwrap());
    }
}
