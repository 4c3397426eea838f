//! Asset group registry
//!
//! The registry is the only owner of version histories. Each group sits behind
//! its own async mutex, so mutations on one group are serialized (which is what
//! makes `swap` atomic) while different groups proceed in parallel.
//!
//! Every mutation works on a clone, writes the clone through the `GroupStore`,
//! and only then replaces the in-memory group. A storage failure leaves the
//! group as it was.
//!
//! Structural operations (create, duplicate, rename, delete) additionally take
//! a registry-wide gate so name checks and map updates cannot interleave.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::display::DisplayContext;
use crate::error::{Result, TripticError};
use crate::imaging;
use crate::storage::helper::unix_timestamp;
use crate::storage::ids::{AssetGroupId, PlaylistId};
use crate::storage::traits::{BlobStore, GroupStore, StorageTypes};
use crate::storage::types::{
    AssetGroup, AssetVersion, ContentRef, DisplayLock, MediaKind, NewVersion, Screen,
    VersionOrigin,
};
use crate::version_store::VersionError;

/// `None` once the group has been deleted or renamed away
type Slot = Arc<Mutex<Option<AssetGroup>>>;

pub struct AssetGroupRegistry<S: StorageTypes> {
    groups: RwLock<HashMap<AssetGroupId, Slot>>,
    structure_gate: Mutex<()>,
    store: Arc<S::Group>,
    blobs: Arc<S::Blob>,
    display: Arc<DisplayContext<S>>,
    _marker: PhantomData<S>,
}

fn version_error(group: &AssetGroupId, screen: Screen, err: VersionError) -> TripticError {
    match err {
        VersionError::NotFound(version) => TripticError::VersionNotFound {
            group: group.clone(),
            screen,
            version,
        },
        VersionError::IsCurrent(version) => TripticError::CannotDeleteCurrent {
            group: group.clone(),
            screen,
            version,
        },
    }
}

fn distinct(a: Screen, b: Screen, op: &str) -> Result<()> {
    if a == b {
        return Err(TripticError::InvalidInput(format!(
            "cannot {} {} onto itself",
            op, a
        )));
    }
    Ok(())
}

fn current_of(group: &AssetGroup, screen: Screen) -> Result<AssetVersion> {
    group
        .screen(screen)
        .current()
        .cloned()
        .ok_or_else(|| TripticError::NoCurrentVersion {
            group: group.id.clone(),
            screen,
        })
}

impl<S: StorageTypes> AssetGroupRegistry<S> {
    /// Load every persisted group
    pub async fn load(
        store: Arc<S::Group>,
        blobs: Arc<S::Blob>,
        display: Arc<DisplayContext<S>>,
    ) -> Result<Self> {
        let loaded = store.load_groups().await?;
        info!(groups = loaded.len(), "Loaded asset groups");
        let groups = loaded
            .into_iter()
            .map(|g| (g.id.clone(), Arc::new(Mutex::new(Some(g)))))
            .collect();
        Ok(Self {
            groups: RwLock::new(groups),
            structure_gate: Mutex::new(()),
            store,
            blobs,
            display,
            _marker: PhantomData,
        })
    }

    pub fn blobs(&self) -> &Arc<S::Blob> {
        &self.blobs
    }

    fn slot(&self, id: &AssetGroupId) -> Result<Slot> {
        self.groups
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| TripticError::AssetGroupNotFound(id.clone()))
    }

    async fn lock_group(&self, id: &AssetGroupId) -> Result<OwnedMutexGuard<Option<AssetGroup>>> {
        let guard = self.slot(id)?.lock_owned().await;
        if guard.is_none() {
            return Err(TripticError::AssetGroupNotFound(id.clone()));
        }
        Ok(guard)
    }

    /// Persist `next` and publish it under the held lock
    async fn commit(
        &self,
        guard: &mut OwnedMutexGuard<Option<AssetGroup>>,
        next: AssetGroup,
    ) -> Result<()> {
        self.store.save_group(&next).await?;
        **guard = Some(next);
        Ok(())
    }

    /// Apply a synchronous change to one group with write-through
    async fn mutate<T>(
        &self,
        id: &AssetGroupId,
        apply: impl FnOnce(&mut AssetGroup) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.lock_group(id).await?;
        let mut next = match guard.as_ref() {
            Some(group) => group.clone(),
            None => return Err(TripticError::AssetGroupNotFound(id.clone())),
        };
        let out = apply(&mut next)?;
        self.commit(&mut guard, next).await?;
        Ok(out)
    }

    pub fn exists(&self, id: &AssetGroupId) -> bool {
        self.groups.read().unwrap().contains_key(id)
    }

    /// Sorted group ids
    pub fn list(&self) -> Vec<AssetGroupId> {
        let mut ids: Vec<AssetGroupId> = self.groups.read().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Consistent snapshot of one group
    pub async fn get(&self, id: &AssetGroupId) -> Result<AssetGroup> {
        let guard = self.lock_group(id).await?;
        guard
            .clone()
            .ok_or_else(|| TripticError::AssetGroupNotFound(id.clone()))
    }

    /// History of one screen, oldest first
    pub async fn versions(&self, id: &AssetGroupId, screen: Screen) -> Result<Vec<AssetVersion>> {
        Ok(self.get(id).await?.screen(screen).versions().to_vec())
    }

    pub async fn current_version(&self, id: &AssetGroupId, screen: Screen) -> Result<AssetVersion> {
        current_of(&self.get(id).await?, screen)
    }

    /// Bytes behind a content reference
    pub async fn content(&self, content: &ContentRef) -> Result<Vec<u8>> {
        Ok(self.blobs.get(content).await?)
    }

    pub async fn create(&self, id: AssetGroupId) -> Result<AssetGroup> {
        let _gate = self.structure_gate.lock().await;
        if self.exists(&id) {
            return Err(TripticError::AssetGroupExists(id));
        }
        let group = AssetGroup::new(id.clone(), unix_timestamp());
        self.store.save_group(&group).await?;
        self.groups
            .write()
            .unwrap()
            .insert(id.clone(), Arc::new(Mutex::new(Some(group.clone()))));
        info!(group = %id, "Created asset group");
        Ok(group)
    }

    /// Copy a group, full histories included, under a new name
    pub async fn duplicate(&self, id: &AssetGroupId, new_id: AssetGroupId) -> Result<AssetGroup> {
        let _gate = self.structure_gate.lock().await;
        if self.exists(&new_id) {
            return Err(TripticError::AssetGroupExists(new_id));
        }
        let source = self.get(id).await?;
        let copy = AssetGroup::from_screens(
            new_id.clone(),
            unix_timestamp(),
            [
                source.screen(Screen::Left).clone(),
                source.screen(Screen::Center).clone(),
                source.screen(Screen::Right).clone(),
            ],
        );
        self.store.save_group(&copy).await?;
        self.groups
            .write()
            .unwrap()
            .insert(new_id.clone(), Arc::new(Mutex::new(Some(copy.clone()))));
        info!(from = %id, to = %new_id, "Duplicated asset group");
        Ok(copy)
    }

    /// Rename a group; playlists and the display lock follow the new name
    pub async fn rename(&self, id: &AssetGroupId, new_id: AssetGroupId) -> Result<AssetGroup> {
        if *id == new_id {
            return Err(TripticError::InvalidInput(format!(
                "asset group is already named '{}'",
                new_id
            )));
        }
        let _gate = self.structure_gate.lock().await;
        if self.exists(&new_id) {
            return Err(TripticError::AssetGroupExists(new_id));
        }
        let mut guard = self.lock_group(id).await?;
        let original = match guard.as_ref() {
            Some(group) => group.clone(),
            None => return Err(TripticError::AssetGroupNotFound(id.clone())),
        };
        let mut renamed = original.clone();
        renamed.id = new_id.clone();
        self.store.rename_group(id, &renamed).await?;

        if let Err(e) = self.display.rename_group_refs(id, &new_id).await {
            if let Err(undo) = self.store.rename_group(&new_id, &original).await {
                warn!(from = %new_id, to = %id, "Reverting rename failed: {:#}", undo);
            }
            return Err(e);
        }

        {
            let mut groups = self.groups.write().unwrap();
            groups.remove(id);
            groups.insert(new_id.clone(), Arc::new(Mutex::new(Some(renamed.clone()))));
        }
        // Waiters on the old slot now see the group as gone
        *guard = None;
        info!(from = %id, to = %new_id, "Renamed asset group");
        Ok(renamed)
    }

    /// Delete a group and every version; playlists and the lock drop it.
    ///
    /// References are removed first. If the group itself cannot be deleted
    /// they are put back, so no playlist or lock ever names a missing group.
    pub async fn delete(&self, id: &AssetGroupId) -> Result<()> {
        let _gate = self.structure_gate.lock().await;
        let mut guard = self.lock_group(id).await?;
        let before = self.display.snapshot();
        self.display.remove_group_refs(id).await?;

        if let Err(e) = self.store.delete_group(id).await {
            if let Err(undo) = self.display.restore_group_refs(&before, id).await {
                warn!(group = %id, "Restoring playlist references failed: {}", undo);
            }
            return Err(e.into());
        }
        self.groups.write().unwrap().remove(id);
        *guard = None;
        info!(group = %id, "Deleted asset group");
        Ok(())
    }

    /// Append an existing group to several playlists. Holds the structure
    /// gate so a concurrent delete or rename cannot slip in between.
    pub async fn add_to_playlists(
        &self,
        id: &AssetGroupId,
        playlists: &[PlaylistId],
    ) -> Result<Vec<PlaylistId>> {
        let _gate = self.structure_gate.lock().await;
        if !self.exists(id) {
            return Err(TripticError::AssetGroupNotFound(id.clone()));
        }
        self.display.add_to_playlists(id.clone(), playlists).await
    }

    /// Pin the display to an existing group
    pub async fn lock_display(&self, id: &AssetGroupId) -> Result<DisplayLock> {
        let _gate = self.structure_gate.lock().await;
        if !self.exists(id) {
            return Err(TripticError::AssetGroupNotFound(id.clone()));
        }
        self.display.set_lock(id.clone()).await
    }

    /// Append a version to one screen and make it current
    pub async fn add_version(
        &self,
        id: &AssetGroupId,
        screen: Screen,
        version: NewVersion,
    ) -> Result<u64> {
        let origin = version.origin;
        let number = self
            .mutate(id, |group| {
                Ok(group.screen_mut(screen).push(version, unix_timestamp()))
            })
            .await?;
        info!(group = %id, %screen, version = number, %origin, "Added version");
        Ok(number)
    }

    pub async fn set_current(&self, id: &AssetGroupId, screen: Screen, version: u64) -> Result<()> {
        self.mutate(id, |group| {
            group
                .screen_mut(screen)
                .set_current(version)
                .map_err(|e| version_error(id, screen, e))
        })
        .await?;
        info!(group = %id, %screen, version, "Set current version");
        Ok(())
    }

    /// Remove a non-current version. Its blob stays; content is shared.
    pub async fn delete_version(
        &self,
        id: &AssetGroupId,
        screen: Screen,
        version: u64,
    ) -> Result<AssetVersion> {
        let removed = self
            .mutate(id, |group| {
                group
                    .screen_mut(screen)
                    .delete(version)
                    .map_err(|e| version_error(id, screen, e))
            })
            .await?;
        info!(group = %id, %screen, version, "Deleted version");
        Ok(removed)
    }

    /// Exchange the complete histories of two screens
    pub async fn swap(&self, id: &AssetGroupId, a: Screen, b: Screen) -> Result<()> {
        distinct(a, b, "swap")?;
        self.mutate(id, |group| {
            group.swap_screens(a, b);
            Ok(())
        })
        .await?;
        info!(group = %id, %a, %b, "Swapped screens");
        Ok(())
    }

    /// Add the source screen's current content as a new version on the target
    pub async fn copy(&self, id: &AssetGroupId, source: Screen, target: Screen) -> Result<u64> {
        distinct(source, target, "copy")?;
        let number = self
            .mutate(id, |group| {
                let from = current_of(group, source)?;
                let new = NewVersion::new(from.content_ref, from.prompt, VersionOrigin::Copy)
                    .with_media(from.media)
                    .derived_from(source, from.version_number);
                Ok(group.screen_mut(target).push(new, unix_timestamp()))
            })
            .await?;
        info!(group = %id, %source, %target, version = number, "Copied screen");
        Ok(number)
    }

    /// Mirror the current image of a screen into a new version
    pub async fn flip(&self, id: &AssetGroupId, screen: Screen) -> Result<u64> {
        let mut guard = self.lock_group(id).await?;
        let mut next = match guard.as_ref() {
            Some(group) => group.clone(),
            None => return Err(TripticError::AssetGroupNotFound(id.clone())),
        };
        let source = current_of(&next, screen)?;
        if source.media != MediaKind::Image {
            return Err(TripticError::InvalidInput(format!(
                "{}/{} is a video and cannot be flipped",
                id, screen
            )));
        }

        let bytes = self.blobs.get(&source.content_ref).await?;
        let flipped = imaging::flip_horizontal(&bytes)
            .map_err(|e| TripticError::InvalidInput(format!("{}/{}: {:#}", id, screen, e)))?;
        let content_ref = self.blobs.store(&flipped).await?;

        let new = NewVersion::new(content_ref, source.prompt, VersionOrigin::Flip)
            .derived_from(screen, source.version_number);
        let number = next.screen_mut(screen).push(new, unix_timestamp());
        self.commit(&mut guard, next).await?;
        info!(group = %id, %screen, version = number, "Flipped screen");
        Ok(number)
    }

    /// Store uploaded bytes and add them as a version with an empty prompt
    pub async fn upload(
        &self,
        id: &AssetGroupId,
        screen: Screen,
        bytes: &[u8],
        media: MediaKind,
    ) -> Result<u64> {
        if bytes.is_empty() {
            return Err(TripticError::InvalidInput("upload is empty".to_string()));
        }
        if media == MediaKind::Image && !imaging::is_image(bytes) {
            return Err(TripticError::InvalidInput(
                "upload is not a recognised image format".to_string(),
            ));
        }
        if !self.exists(id) {
            return Err(TripticError::AssetGroupNotFound(id.clone()));
        }
        let content_ref = self.blobs.store(bytes).await?;
        debug!(group = %id, %screen, content = %content_ref, "Stored upload");
        self.add_version(
            id,
            screen,
            NewVersion::new(content_ref, "", VersionOrigin::Upload).with_media(media),
        )
        .await
    }
}
