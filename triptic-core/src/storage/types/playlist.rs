//! Playlist and display lock types

use serde::{Deserialize, Serialize};

use crate::storage::ids::{AssetGroupId, PlaylistId};

/// An ordered, time-rotated list of asset group references
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub items: Vec<AssetGroupId>,
    /// Seconds per item; `None` uses the configured default
    pub interval_secs: Option<u64>,
    /// Unix timestamp (milliseconds) when created
    pub created_at: i64,
}

impl Playlist {
    pub fn new(id: PlaylistId, created_at: i64) -> Self {
        Self {
            id,
            items: Vec::new(),
            interval_secs: None,
            created_at,
        }
    }

    pub fn with_items(mut self, items: Vec<AssetGroupId>) -> Self {
        self.items = items;
        self
    }

    pub fn with_interval(mut self, secs: u64) -> Self {
        self.interval_secs = Some(secs);
        self
    }

    pub fn contains(&self, group: &AssetGroupId) -> bool {
        self.items.iter().any(|g| g == group)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Process-wide override pinning every screen to one asset group
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayLock {
    pub asset_group: AssetGroupId,
    /// Unix timestamp (milliseconds) when the lock was set
    pub locked_at: i64,
}
