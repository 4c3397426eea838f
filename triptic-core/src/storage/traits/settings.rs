//! SettingsStore trait for small JSON-valued runtime settings

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Key-value store for runtime display settings (display lock, selected playlist).
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<Value>>;

    async fn set_setting(&self, key: &str, value: Value) -> Result<()>;

    /// Returns Ok(true) if removed, Ok(false) if it wasn't set
    async fn delete_setting(&self, key: &str) -> Result<bool>;
}
