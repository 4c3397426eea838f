//! In-memory SettingsStore implementation

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::storage::traits::SettingsStore;

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get_setting(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set_setting(&self, key: &str, value: Value) -> Result<()> {
        self.values.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete_setting(&self, key: &str) -> Result<bool> {
        Ok(self.values.lock().unwrap().remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_roundtrip() {
        let store = MemorySettingsStore::new();
        assert!(store.get_setting("current_playlist").await.unwrap().is_none());

        store.set_setting("current_playlist", json!("letters")).await.unwrap();
        assert_eq!(
            store.get_setting("current_playlist").await.unwrap(),
            Some(json!("letters"))
        );

        assert!(store.delete_setting("current_playlist").await.unwrap());
        assert!(!store.delete_setting("current_playlist").await.unwrap());
    }
}
