//! Asset group snapshot type

use serde::{Deserialize, Serialize};

use super::screen::Screen;
use crate::storage::ids::AssetGroupId;
use crate::version_store::VersionStore;

/// Three independently versioned screens under one name.
///
/// This is the unit the registry locks, persists, and hands out as a snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetGroup {
    pub id: AssetGroupId,
    /// Unix timestamp (milliseconds) when created
    pub created_at: i64,
    screens: [VersionStore; 3],
}

impl AssetGroup {
    /// Create a group with three empty screens
    pub fn new(id: AssetGroupId, created_at: i64) -> Self {
        Self {
            id,
            created_at,
            screens: [VersionStore::new(), VersionStore::new(), VersionStore::new()],
        }
    }

    /// Rebuild a group from persisted screen stores (left, center, right)
    pub fn from_screens(id: AssetGroupId, created_at: i64, screens: [VersionStore; 3]) -> Self {
        Self {
            id,
            created_at,
            screens,
        }
    }

    pub fn screen(&self, screen: Screen) -> &VersionStore {
        &self.screens[screen.index()]
    }

    pub fn screen_mut(&mut self, screen: Screen) -> &mut VersionStore {
        &mut self.screens[screen.index()]
    }

    /// Exchange the complete histories and current pointers of two screens
    pub fn swap_screens(&mut self, a: Screen, b: Screen) {
        self.screens.swap(a.index(), b.index());
    }

    /// Iterate `(screen, store)` in display order
    pub fn iter(&self) -> impl Iterator<Item = (Screen, &VersionStore)> {
        Screen::ALL.into_iter().map(move |s| (s, self.screen(s)))
    }

    /// Whether every screen has a current version
    pub fn is_complete(&self) -> bool {
        self.screens.iter().all(|s| s.current().is_some())
    }
}
