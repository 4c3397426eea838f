//! SQLite implementation of SettingsStore

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use super::SqliteStore;
use crate::storage::helper::unix_timestamp;
use crate::storage::traits::SettingsStore;

pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Key/value settings with JSON values
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )
    .context("Failed to initialize settings schema")?;
    Ok(())
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn get_setting(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.conn().lock().unwrap();
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|s| serde_json::from_str(&s).with_context(|| format!("Bad JSON in setting {}", key)))
            .transpose()
    }

    async fn set_setting(&self, key: &str, value: Value) -> Result<()> {
        let conn = self.conn().lock().unwrap();
        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value.to_string(), unix_timestamp()],
        )?;
        Ok(())
    }

    async fn delete_setting(&self, key: &str) -> Result<bool> {
        let conn = self.conn().lock().unwrap();
        let deleted = conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_and_delete() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_setting("frequency", json!(60)).await.unwrap();
        store.set_setting("frequency", json!(120)).await.unwrap();
        assert_eq!(store.get_setting("frequency").await.unwrap(), Some(json!(120)));

        let lock = json!({"asset_group": "animals/cat", "locked_at": 7});
        store.set_setting("display_lock", lock.clone()).await.unwrap();
        assert_eq!(store.get_setting("display_lock").await.unwrap(), Some(lock));

        assert!(store.delete_setting("display_lock").await.unwrap());
        assert_eq!(store.get_setting("display_lock").await.unwrap(), None);
    }
}
