//! In-memory GroupStore implementation

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::storage::ids::AssetGroupId;
use crate::storage::traits::GroupStore;
use crate::storage::types::AssetGroup;

#[derive(Debug, Default)]
pub struct MemoryGroupStore {
    groups: Mutex<HashMap<AssetGroupId, AssetGroup>>,
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct snapshot lookup, for tests that check what was written through
    pub fn snapshot(&self, id: &AssetGroupId) -> Option<AssetGroup> {
        self.groups.lock().unwrap().get(id).cloned()
    }
}

#[async_trait]
impl GroupStore for MemoryGroupStore {
    async fn load_groups(&self) -> Result<Vec<AssetGroup>> {
        let mut groups: Vec<AssetGroup> = self.groups.lock().unwrap().values().cloned().collect();
        groups.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(groups)
    }

    async fn save_group(&self, group: &AssetGroup) -> Result<()> {
        self.groups
            .lock()
            .unwrap()
            .insert(group.id.clone(), group.clone());
        Ok(())
    }

    async fn delete_group(&self, id: &AssetGroupId) -> Result<bool> {
        Ok(self.groups.lock().unwrap().remove(id).is_some())
    }

    async fn rename_group(&self, old: &AssetGroupId, renamed: &AssetGroup) -> Result<()> {
        let mut groups = self.groups.lock().unwrap();
        if groups.contains_key(&renamed.id) {
            anyhow::bail!("Asset group already stored: {}", renamed.id);
        }
        groups.remove(old);
        groups.insert(renamed.id.clone(), renamed.clone());
        Ok(())
    }
}
