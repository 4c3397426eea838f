//! Stateless time-based playlist rotation

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::context::DisplayContext;
use crate::error::{Result, TripticError};
use crate::storage::ids::{AssetGroupId, PlaylistId};
use crate::storage::traits::StorageTypes;
use crate::storage::types::DisplayLock;

/// Index of the item showing at `epoch_secs`.
///
/// `floor(epoch_secs / interval) mod len`, with Euclidean division so instants
/// before the epoch still land in range. `len` must be non-zero.
pub fn rotation_index(epoch_secs: i64, interval_secs: u64, len: usize) -> usize {
    let interval = interval_secs.max(1) as i128;
    let slot = (epoch_secs as i128).div_euclid(interval);
    slot.rem_euclid(len as i128) as usize
}

/// Picks the asset group a playlist points to at a given instant
pub struct PlaylistRotator<S: StorageTypes> {
    display: Arc<DisplayContext<S>>,
}

impl<S: StorageTypes> Clone for PlaylistRotator<S> {
    fn clone(&self) -> Self {
        Self {
            display: self.display.clone(),
        }
    }
}

impl<S: StorageTypes> PlaylistRotator<S> {
    pub fn new(display: Arc<DisplayContext<S>>) -> Self {
        Self { display }
    }

    /// The group `playlist` shows at `at`.
    ///
    /// A display lock overrides rotation for every existing playlist, even an
    /// empty one. The playlist itself must exist either way.
    pub fn current_item(&self, playlist: &PlaylistId, at: DateTime<Utc>) -> Result<AssetGroupId> {
        let state = self.display.snapshot();
        let entry = state.playlist(playlist)?;
        if let Some(lock) = &state.lock {
            return Ok(lock.asset_group.clone());
        }
        if entry.is_empty() {
            return Err(TripticError::EmptyPlaylist(playlist.clone()));
        }
        let interval = self.display.interval_for(entry);
        let index = rotation_index(at.timestamp(), interval, entry.len());
        Ok(entry.items[index].clone())
    }

    /// Resolve what to show when the caller may not name a playlist.
    ///
    /// The lock wins outright; otherwise the named playlist, then the selected one.
    pub fn resolve(&self, playlist: Option<&PlaylistId>, at: DateTime<Utc>) -> Result<AssetGroupId> {
        let state = self.display.snapshot();
        if let Some(lock) = &state.lock {
            return Ok(lock.asset_group.clone());
        }
        let id = match playlist {
            Some(id) => id.clone(),
            None => state
                .current_playlist
                .clone()
                .ok_or(TripticError::NoPlaylistSelected)?,
        };
        self.current_item(&id, at)
    }

    /// Seconds until `playlist` advances past `at`
    pub fn seconds_until_next(&self, playlist: &PlaylistId, at: DateTime<Utc>) -> Result<u64> {
        let entry = self.display.playlist(playlist)?;
        let interval = self.display.interval_for(&entry).max(1) as i64;
        Ok((interval - at.timestamp().rem_euclid(interval)) as u64)
    }

    pub async fn set_lock(&self, group: AssetGroupId) -> Result<DisplayLock> {
        self.display.set_lock(group).await
    }

    pub async fn clear_lock(&self) -> Result<Option<DisplayLock>> {
        self.display.clear_lock().await
    }
}
