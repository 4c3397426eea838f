//! Injected display state: playlists, display lock, selected playlist, heartbeats
//!
//! Readers take a cheap `Arc` snapshot under a read lock. Writers go through a
//! single async gate: they clone the snapshot, apply the change, persist it, and
//! only then publish the new snapshot. A failed write leaves the published state
//! untouched.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::heartbeat::{Heartbeat, HeartbeatBoard};
use crate::error::{Result, TripticError};
use crate::storage::helper::{unix_timestamp, SETTING_CURRENT_PLAYLIST, SETTING_DISPLAY_LOCK};
use crate::storage::ids::{AssetGroupId, PlaylistId};
use crate::storage::traits::{PlaylistStore, SettingsStore, StorageTypes, Stores};
use crate::storage::types::{DisplayLock, Playlist};

/// Immutable snapshot of everything the display reads
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub playlists: BTreeMap<PlaylistId, Playlist>,
    pub lock: Option<DisplayLock>,
    pub current_playlist: Option<PlaylistId>,
}

impl DisplayState {
    pub fn playlist(&self, id: &PlaylistId) -> Result<&Playlist> {
        self.playlists
            .get(id)
            .ok_or_else(|| TripticError::PlaylistNotFound(id.clone()))
    }

    fn playlist_mut(&mut self, id: &PlaylistId) -> Result<&mut Playlist> {
        self.playlists
            .get_mut(id)
            .ok_or_else(|| TripticError::PlaylistNotFound(id.clone()))
    }
}

/// A write that has to reach the stores before the snapshot is published
enum Change {
    Save(PlaylistId),
    Delete(PlaylistId),
    Rename(PlaylistId, PlaylistId),
    Lock,
    Selection,
}

impl Change {
    /// The change that restores what `prev` held
    fn undo(&self, prev: &DisplayState) -> Change {
        match self {
            Change::Save(id) if !prev.playlists.contains_key(id) => Change::Delete(id.clone()),
            Change::Save(id) | Change::Delete(id) => Change::Save(id.clone()),
            Change::Rename(old, new) => Change::Rename(new.clone(), old.clone()),
            Change::Lock => Change::Lock,
            Change::Selection => Change::Selection,
        }
    }
}

pub struct DisplayContext<S: StorageTypes> {
    state: RwLock<Arc<DisplayState>>,
    write_gate: Mutex<()>,
    playlist_store: Arc<S::Playlist>,
    settings_store: Arc<S::Settings>,
    default_interval_secs: u64,
    heartbeats: HeartbeatBoard,
    _marker: PhantomData<S>,
}

impl<S: StorageTypes> DisplayContext<S> {
    /// Load playlists, the lock, and the selected playlist from storage
    pub async fn load(
        playlist_store: Arc<S::Playlist>,
        settings_store: Arc<S::Settings>,
        default_interval_secs: u64,
    ) -> Result<Self> {
        if default_interval_secs == 0 {
            return Err(TripticError::InvalidInput(
                "rotation interval must be at least one second".to_string(),
            ));
        }

        let playlists: BTreeMap<PlaylistId, Playlist> = playlist_store
            .load_playlists()
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        let lock = match settings_store.get_setting(SETTING_DISPLAY_LOCK).await? {
            Some(value) => match serde_json::from_value::<DisplayLock>(value) {
                Ok(lock) => Some(lock),
                Err(e) => {
                    warn!("Ignoring unreadable display lock setting: {}", e);
                    None
                }
            },
            None => None,
        };

        let current_playlist = settings_store
            .get_setting(SETTING_CURRENT_PLAYLIST)
            .await?
            .and_then(|v| v.as_str().map(PlaylistId::from_string))
            .filter(|id| {
                let known = playlists.contains_key(id);
                if !known {
                    warn!("Selected playlist '{}' no longer exists", id);
                }
                known
            });

        info!(
            playlists = playlists.len(),
            locked = lock.is_some(),
            "Loaded display state"
        );

        Ok(Self {
            state: RwLock::new(Arc::new(DisplayState {
                playlists,
                lock,
                current_playlist,
            })),
            write_gate: Mutex::new(()),
            playlist_store,
            settings_store,
            default_interval_secs,
            heartbeats: HeartbeatBoard::new(),
            _marker: PhantomData,
        })
    }

    pub async fn from_stores(stores: &impl Stores<S>, default_interval_secs: u64) -> Result<Self> {
        Self::load(stores.playlist(), stores.settings(), default_interval_secs).await
    }

    /// Current published state
    pub fn snapshot(&self) -> Arc<DisplayState> {
        self.state.read().unwrap().clone()
    }

    pub fn default_interval_secs(&self) -> u64 {
        self.default_interval_secs
    }

    /// Rotation interval for a playlist, falling back to the configured default
    pub fn interval_for(&self, playlist: &Playlist) -> u64 {
        playlist.interval_secs.unwrap_or(self.default_interval_secs)
    }

    pub fn playlists(&self) -> Vec<Playlist> {
        self.snapshot().playlists.values().cloned().collect()
    }

    pub fn playlist(&self, id: &PlaylistId) -> Result<Playlist> {
        self.snapshot().playlist(id).cloned()
    }

    pub fn lock(&self) -> Option<DisplayLock> {
        self.snapshot().lock.clone()
    }

    pub fn current_playlist(&self) -> Option<PlaylistId> {
        self.snapshot().current_playlist.clone()
    }

    /// Playlists that reference a group
    pub fn playlists_containing(&self, group: &AssetGroupId) -> Vec<PlaylistId> {
        self.snapshot()
            .playlists
            .values()
            .filter(|p| p.contains(group))
            .map(|p| p.id.clone())
            .collect()
    }

    pub async fn create_playlist(
        &self,
        id: PlaylistId,
        interval_secs: Option<u64>,
    ) -> Result<Playlist> {
        check_interval(interval_secs)?;
        let created = self
            .update(|state| {
                if state.playlists.contains_key(&id) {
                    return Err(TripticError::PlaylistExists(id.clone()));
                }
                let mut playlist = Playlist::new(id.clone(), unix_timestamp());
                playlist.interval_secs = interval_secs;
                state.playlists.insert(id.clone(), playlist.clone());
                Ok((playlist, vec![Change::Save(id.clone())]))
            })
            .await?;
        info!(playlist = %created.id, "Created playlist");
        Ok(created)
    }

    pub async fn delete_playlist(&self, id: &PlaylistId) -> Result<()> {
        self.update(|state| {
            if state.playlists.remove(id).is_none() {
                return Err(TripticError::PlaylistNotFound(id.clone()));
            }
            let mut changes = vec![Change::Delete(id.clone())];
            if state.current_playlist.as_ref() == Some(id) {
                state.current_playlist = None;
                changes.push(Change::Selection);
            }
            Ok(((), changes))
        })
        .await?;
        info!(playlist = %id, "Deleted playlist");
        Ok(())
    }

    pub async fn rename_playlist(&self, old: &PlaylistId, new: PlaylistId) -> Result<Playlist> {
        if *old == new {
            return Err(TripticError::InvalidInput(format!(
                "playlist is already named '{}'",
                new
            )));
        }
        let renamed = self
            .update(|state| {
                if state.playlists.contains_key(&new) {
                    return Err(TripticError::PlaylistExists(new.clone()));
                }
                let mut playlist = state
                    .playlists
                    .remove(old)
                    .ok_or_else(|| TripticError::PlaylistNotFound(old.clone()))?;
                playlist.id = new.clone();
                state.playlists.insert(new.clone(), playlist.clone());

                let mut changes = vec![Change::Rename(old.clone(), new.clone())];
                if state.current_playlist.as_ref() == Some(old) {
                    state.current_playlist = Some(new.clone());
                    changes.push(Change::Selection);
                }
                Ok((playlist, changes))
            })
            .await?;
        info!(from = %old, to = %renamed.id, "Renamed playlist");
        Ok(renamed)
    }

    /// Append a group; returns false if the playlist already holds it
    pub async fn add_item(&self, playlist: &PlaylistId, group: AssetGroupId) -> Result<bool> {
        let added = self.add_to_playlists(group, std::slice::from_ref(playlist)).await?;
        Ok(!added.is_empty())
    }

    /// Append a group to several playlists at once.
    ///
    /// Every playlist must exist or nothing changes. Returns the playlists the
    /// group was actually appended to.
    pub async fn add_to_playlists(
        &self,
        group: AssetGroupId,
        playlists: &[PlaylistId],
    ) -> Result<Vec<PlaylistId>> {
        let added = self
            .update(|state| {
                for id in playlists {
                    state.playlist(id)?;
                }
                let mut added = Vec::new();
                for id in playlists {
                    let playlist = state.playlist_mut(id)?;
                    if playlist.contains(&group) {
                        debug!(playlist = %id, group = %group, "Group already in playlist");
                        continue;
                    }
                    playlist.items.push(group.clone());
                    added.push(id.clone());
                }
                let changes = added.iter().cloned().map(Change::Save).collect();
                Ok((added, changes))
            })
            .await?;
        if !added.is_empty() {
            info!(group = %group, playlists = added.len(), "Added group to playlists");
        }
        Ok(added)
    }

    /// Remove a group; returns false if it was not in the playlist
    pub async fn remove_item(&self, playlist: &PlaylistId, group: &AssetGroupId) -> Result<bool> {
        self.update(|state| {
            let entry = state.playlist_mut(playlist)?;
            let before = entry.items.len();
            entry.items.retain(|g| g != group);
            if entry.items.len() == before {
                return Ok((false, Vec::new()));
            }
            Ok((true, vec![Change::Save(playlist.clone())]))
        })
        .await
    }

    /// Replace the item order; `items` must be a permutation of the current items
    pub async fn reorder(&self, playlist: &PlaylistId, items: Vec<AssetGroupId>) -> Result<()> {
        self.update(|state| {
            let entry = state.playlist_mut(playlist)?;
            let mut expected = entry.items.clone();
            let mut given = items.clone();
            expected.sort();
            given.sort();
            if expected != given {
                return Err(TripticError::InvalidInput(format!(
                    "reorder of '{}' must list exactly its current items",
                    playlist
                )));
            }
            entry.items = items;
            Ok(((), vec![Change::Save(playlist.clone())]))
        })
        .await?;
        info!(playlist = %playlist, "Reordered playlist");
        Ok(())
    }

    pub async fn set_interval(&self, playlist: &PlaylistId, interval_secs: Option<u64>) -> Result<()> {
        check_interval(interval_secs)?;
        self.update(|state| {
            state.playlist_mut(playlist)?.interval_secs = interval_secs;
            Ok(((), vec![Change::Save(playlist.clone())]))
        })
        .await
    }

    /// Choose the playlist used when display resolution names none
    pub async fn select_playlist(&self, playlist: Option<PlaylistId>) -> Result<()> {
        self.update(|state| {
            if let Some(id) = &playlist {
                state.playlist(id)?;
            }
            state.current_playlist = playlist.clone();
            Ok(((), vec![Change::Selection]))
        })
        .await?;
        match &playlist {
            Some(id) => info!(playlist = %id, "Selected playlist"),
            None => info!("Cleared playlist selection"),
        }
        Ok(())
    }

    /// Pin every screen to one group. Callers check that the group exists.
    pub async fn set_lock(&self, group: AssetGroupId) -> Result<DisplayLock> {
        let lock = self
            .update(|state| {
                let lock = DisplayLock {
                    asset_group: group.clone(),
                    locked_at: unix_timestamp(),
                };
                state.lock = Some(lock.clone());
                Ok((lock, vec![Change::Lock]))
            })
            .await?;
        info!(group = %lock.asset_group, "Display locked");
        Ok(lock)
    }

    /// Resume rotation; returns the lock that was cleared, if any
    pub async fn clear_lock(&self) -> Result<Option<DisplayLock>> {
        let cleared = self
            .update(|state| {
                let cleared = state.lock.take();
                let changes = if cleared.is_some() {
                    vec![Change::Lock]
                } else {
                    Vec::new()
                };
                Ok((cleared, changes))
            })
            .await?;
        if cleared.is_some() {
            info!("Display lock cleared");
        }
        Ok(cleared)
    }

    /// Point every playlist entry and the lock at a renamed group
    pub(crate) async fn rename_group_refs(&self, old: &AssetGroupId, new: &AssetGroupId) -> Result<()> {
        self.update(|state| {
            let mut changes = Vec::new();
            for playlist in state.playlists.values_mut() {
                if !playlist.contains(old) {
                    continue;
                }
                let already_has_new = playlist.contains(new);
                if already_has_new {
                    playlist.items.retain(|g| g != old);
                } else {
                    for item in playlist.items.iter_mut().filter(|g| **g == *old) {
                        *item = new.clone();
                    }
                }
                changes.push(Change::Save(playlist.id.clone()));
            }
            if let Some(lock) = state.lock.as_mut().filter(|l| l.asset_group == *old) {
                lock.asset_group = new.clone();
                changes.push(Change::Lock);
            }
            Ok(((), changes))
        })
        .await
    }

    /// Drop a deleted group from every playlist and release a lock on it
    pub(crate) async fn remove_group_refs(&self, group: &AssetGroupId) -> Result<()> {
        self.update(|state| {
            let mut changes = Vec::new();
            for playlist in state.playlists.values_mut() {
                if playlist.contains(group) {
                    playlist.items.retain(|g| g != group);
                    changes.push(Change::Save(playlist.id.clone()));
                }
            }
            if state.lock.as_ref().is_some_and(|l| l.asset_group == *group) {
                state.lock = None;
                changes.push(Change::Lock);
            }
            Ok(((), changes))
        })
        .await
    }

    /// Put `group` back where `before` had it, after a delete that did not go through
    pub(crate) async fn restore_group_refs(
        &self,
        before: &DisplayState,
        group: &AssetGroupId,
    ) -> Result<()> {
        self.update(|state| {
            let mut changes = Vec::new();
            for (id, earlier) in &before.playlists {
                let Some(playlist) = state.playlists.get_mut(id) else {
                    continue;
                };
                if earlier.contains(group) && !playlist.contains(group) {
                    playlist.items = earlier.items.clone();
                    changes.push(Change::Save(id.clone()));
                }
            }
            let was_locked = before.lock.as_ref().filter(|l| l.asset_group == *group);
            if state.lock.is_none() {
                if let Some(lock) = was_locked {
                    state.lock = Some(lock.clone());
                    changes.push(Change::Lock);
                }
            }
            Ok(((), changes))
        })
        .await
    }

    pub fn record_heartbeat(&self, screen_id: &str) {
        self.heartbeats.record(screen_id, unix_timestamp());
    }

    pub fn heartbeats(&self) -> Vec<Heartbeat> {
        self.heartbeats.all()
    }

    async fn update<T>(
        &self,
        apply: impl FnOnce(&mut DisplayState) -> Result<(T, Vec<Change>)>,
    ) -> Result<T> {
        let _gate = self.write_gate.lock().await;
        let prev = self.snapshot();
        let mut next = (*prev).clone();
        let (out, changes) = apply(&mut next)?;
        if changes.is_empty() {
            return Ok(out);
        }
        for (done, change) in changes.iter().enumerate() {
            if let Err(e) = self.persist(&next, change).await {
                self.rollback(&prev, &changes[..done]).await;
                return Err(e.into());
            }
        }
        *self.state.write().unwrap() = Arc::new(next);
        Ok(out)
    }

    /// Write back the values `prev` held for changes that already reached the stores
    async fn rollback(&self, prev: &DisplayState, applied: &[Change]) {
        for change in applied.iter().rev() {
            let undo = change.undo(prev);
            if let Err(e) = self.persist(prev, &undo).await {
                warn!("Rolling back display change failed; storage may disagree until restart: {:#}", e);
            }
        }
    }

    async fn persist(&self, state: &DisplayState, change: &Change) -> anyhow::Result<()> {
        match change {
            Change::Save(id) => {
                if let Some(playlist) = state.playlists.get(id) {
                    self.playlist_store.save_playlist(playlist).await?;
                }
            }
            Change::Delete(id) => {
                self.playlist_store.delete_playlist(id).await?;
            }
            Change::Rename(old, new) => {
                if let Some(playlist) = state.playlists.get(new) {
                    self.playlist_store.rename_playlist(old, playlist).await?;
                }
            }
            Change::Lock => match &state.lock {
                Some(lock) => {
                    self.settings_store
                        .set_setting(SETTING_DISPLAY_LOCK, serde_json::to_value(lock)?)
                        .await?
                }
                None => {
                    self.settings_store.delete_setting(SETTING_DISPLAY_LOCK).await?;
                }
            },
            Change::Selection => match &state.current_playlist {
                Some(id) => {
                    self.settings_store
                        .set_setting(SETTING_CURRENT_PLAYLIST, serde_json::json!(id.as_str()))
                        .await?
                }
                None => {
                    self.settings_store
                        .delete_setting(SETTING_CURRENT_PLAYLIST)
                        .await?;
                }
            },
        }
        Ok(())
    }
}

fn check_interval(interval_secs: Option<u64>) -> Result<()> {
    if interval_secs == Some(0) {
        return Err(TripticError::InvalidInput(
            "rotation interval must be at least one second".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::implementations::memory::{MemoryStorage, MemoryStores};

    async fn context(stores: &MemoryStores) -> DisplayContext<MemoryStorage> {
        DisplayContext::from_stores(stores, 600).await.unwrap()
    }

    fn pid(s: &str) -> PlaylistId {
        PlaylistId::from_string(s)
    }

    fn gid(s: &str) -> AssetGroupId {
        AssetGroupId::from_string(s)
    }

    #[tokio::test]
    async fn test_playlist_lifecycle() {
        let stores = MemoryStores::new();
        let ctx = context(&stores).await;

        ctx.create_playlist(pid("letters"), None).await.unwrap();
        assert!(matches!(
            ctx.create_playlist(pid("letters"), None).await,
            Err(TripticError::PlaylistExists(_))
        ));

        assert!(ctx.add_item(&pid("letters"), gid("a")).await.unwrap());
        assert!(ctx.add_item(&pid("letters"), gid("b")).await.unwrap());
        assert!(!ctx.add_item(&pid("letters"), gid("a")).await.unwrap());
        assert_eq!(ctx.playlist(&pid("letters")).unwrap().items, vec![gid("a"), gid("b")]);

        ctx.reorder(&pid("letters"), vec![gid("b"), gid("a")]).await.unwrap();
        assert!(ctx.reorder(&pid("letters"), vec![gid("b")]).await.is_err());

        assert!(ctx.remove_item(&pid("letters"), &gid("b")).await.unwrap());
        assert!(!ctx.remove_item(&pid("letters"), &gid("b")).await.unwrap());
        assert_eq!(ctx.playlist(&pid("letters")).unwrap().items, vec![gid("a")]);
    }

    #[tokio::test]
    async fn test_add_to_many_is_all_or_nothing() {
        let stores = MemoryStores::new();
        let ctx = context(&stores).await;
        ctx.create_playlist(pid("one"), None).await.unwrap();
        ctx.create_playlist(pid("two"), None).await.unwrap();

        let result = ctx
            .add_to_playlists(gid("g"), &[pid("one"), pid("missing")])
            .await;
        assert!(matches!(result, Err(TripticError::PlaylistNotFound(_))));
        assert!(ctx.playlist(&pid("one")).unwrap().is_empty());

        let added = ctx
            .add_to_playlists(gid("g"), &[pid("one"), pid("two")])
            .await
            .unwrap();
        assert_eq!(added, vec![pid("one"), pid("two")]);
        assert_eq!(ctx.playlists_containing(&gid("g")).len(), 2);
    }

    #[tokio::test]
    async fn test_state_survives_reload() {
        let stores = MemoryStores::new();
        {
            let ctx = context(&stores).await;
            ctx.create_playlist(pid("letters"), Some(30)).await.unwrap();
            ctx.add_item(&pid("letters"), gid("a")).await.unwrap();
            ctx.select_playlist(Some(pid("letters"))).await.unwrap();
            ctx.set_lock(gid("a")).await.unwrap();
        }

        let ctx = context(&stores).await;
        assert_eq!(ctx.current_playlist(), Some(pid("letters")));
        assert_eq!(ctx.lock().map(|l| l.asset_group), Some(gid("a")));
        let playlist = ctx.playlist(&pid("letters")).unwrap();
        assert_eq!(ctx.interval_for(&playlist), 30);
    }

    #[tokio::test]
    async fn test_rename_and_delete_follow_selection() {
        let stores = MemoryStores::new();
        let ctx = context(&stores).await;
        ctx.create_playlist(pid("old"), None).await.unwrap();
        ctx.select_playlist(Some(pid("old"))).await.unwrap();

        ctx.rename_playlist(&pid("old"), pid("new")).await.unwrap();
        assert_eq!(ctx.current_playlist(), Some(pid("new")));
        assert!(ctx.playlist(&pid("old")).is_err());

        ctx.delete_playlist(&pid("new")).await.unwrap();
        assert_eq!(ctx.current_playlist(), None);
        assert!(stores.playlist().load_playlists().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_group_cascades() {
        let stores = MemoryStores::new();
        let ctx = context(&stores).await;
        ctx.create_playlist(pid("p"), None).await.unwrap();
        ctx.add_item(&pid("p"), gid("a")).await.unwrap();
        ctx.add_item(&pid("p"), gid("b")).await.unwrap();
        ctx.set_lock(gid("a")).await.unwrap();

        ctx.rename_group_refs(&gid("a"), &gid("z")).await.unwrap();
        assert_eq!(ctx.playlist(&pid("p")).unwrap().items, vec![gid("z"), gid("b")]);
        assert_eq!(ctx.lock().unwrap().asset_group, gid("z"));

        ctx.remove_group_refs(&gid("z")).await.unwrap();
        assert_eq!(ctx.playlist(&pid("p")).unwrap().items, vec![gid("b")]);
        assert!(ctx.lock().is_none());
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let stores = MemoryStores::new();
        let ctx = context(&stores).await;
        assert!(matches!(
            ctx.create_playlist(pid("p"), Some(0)).await,
            Err(TripticError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_heartbeats_per_screen() {
        let stores = MemoryStores::new();
        let ctx = context(&stores).await;
        assert!(ctx.heartbeats().is_empty());

        ctx.record_heartbeat("hall-left");
        ctx.record_heartbeat("hall-right");
        ctx.record_heartbeat("hall-left");
        let ids: Vec<String> = ctx.heartbeats().into_iter().map(|h| h.screen_id).collect();
        assert_eq!(ids, vec!["hall-left".to_string(), "hall-right".to_string()]);
        assert!(ctx.heartbeats().iter().all(|h| h.last_sync > 0));
    }
}
