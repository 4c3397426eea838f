//! Triptic - wires registry, generation queue and display state together
//!
//! Outer layers (the CLI, a web server) hold one `Triptic` and go through it for
//! anything that spans components, such as checking a group exists before
//! adding it to a playlist or resolving what a screen should show right now.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::display::{DisplayContext, PlaylistRotator};
use crate::error::{Result, TripticError};
use crate::generation::{
    GenerationQueue, GenerationRequest, Generator, JobKind, JobState, JobTarget, QueueConfig,
};
use crate::registry::AssetGroupRegistry;
use crate::storage::ids::{AssetGroupId, JobId, PlaylistId};
use crate::storage::traits::{StorageTypes, Stores};
use crate::storage::types::{ContentRef, DisplayLock, MediaKind, Screen};

/// Runtime knobs for the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Seconds each playlist item stays on screen unless the playlist overrides it
    pub rotation_interval_secs: u64,
    pub queue: QueueConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rotation_interval_secs: 600,
            queue: QueueConfig::default(),
        }
    }
}

/// What one screen should show
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScreenContent {
    Version {
        version: u64,
        content_ref: ContentRef,
        media: MediaKind,
        prompt: String,
    },
    /// The screen has no version yet; clients render their default art
    Placeholder,
}

/// Resolved display for one screen at one instant
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DisplayItem {
    pub asset_group: AssetGroupId,
    pub screen: Screen,
    pub locked: bool,
    pub content: ScreenContent,
}

/// Overview used by `status` style commands
#[derive(Clone, Debug, Serialize)]
pub struct Status {
    pub asset_groups: usize,
    pub playlists: usize,
    pub current_playlist: Option<PlaylistId>,
    pub lock: Option<DisplayLock>,
    pub queued_jobs: usize,
    pub processing_jobs: usize,
}

pub struct Triptic<S: StorageTypes> {
    registry: Arc<AssetGroupRegistry<S>>,
    display: Arc<DisplayContext<S>>,
    rotator: PlaylistRotator<S>,
    queue: GenerationQueue<S>,
}

impl<S: StorageTypes> Triptic<S> {
    /// Load all persisted state and start the generation queue
    pub async fn open(
        stores: &impl Stores<S>,
        generator: Arc<dyn Generator>,
        config: EngineConfig,
    ) -> Result<Self> {
        let display = Arc::new(
            DisplayContext::from_stores(stores, config.rotation_interval_secs).await?,
        );
        let registry = Arc::new(
            AssetGroupRegistry::load(stores.group(), stores.blob(), display.clone()).await?,
        );
        let rotator = PlaylistRotator::new(display.clone());
        let queue = GenerationQueue::new(registry.clone(), generator, config.queue);
        info!("Triptic engine ready");
        Ok(Self {
            registry,
            display,
            rotator,
            queue,
        })
    }

    pub fn registry(&self) -> &AssetGroupRegistry<S> {
        &self.registry
    }

    pub fn display(&self) -> &DisplayContext<S> {
        &self.display
    }

    pub fn rotator(&self) -> &PlaylistRotator<S> {
        &self.rotator
    }

    pub fn queue(&self) -> &GenerationQueue<S> {
        &self.queue
    }

    /// Validate an operator-supplied name and create the group
    pub async fn create_asset_group(&self, name: &str) -> Result<AssetGroupId> {
        let id = AssetGroupId::parse(name)?;
        self.registry.create(id.clone()).await?;
        Ok(id)
    }

    pub async fn rename_asset_group(&self, id: &AssetGroupId, new_name: &str) -> Result<AssetGroupId> {
        let new_id = AssetGroupId::parse(new_name)?;
        self.registry.rename(id, new_id.clone()).await?;
        Ok(new_id)
    }

    pub async fn duplicate_asset_group(&self, id: &AssetGroupId, new_name: &str) -> Result<AssetGroupId> {
        let new_id = AssetGroupId::parse(new_name)?;
        self.registry.duplicate(id, new_id.clone()).await?;
        Ok(new_id)
    }

    pub async fn generate(
        &self,
        group: &AssetGroupId,
        screen: Screen,
        request: GenerationRequest,
    ) -> Result<JobId> {
        self.queue
            .enqueue(JobKind::ImageGenerate, JobTarget::new(group.clone(), screen), request)
            .await
    }

    pub async fn edit(&self, group: &AssetGroupId, screen: Screen, prompt: &str) -> Result<JobId> {
        self.queue
            .enqueue(
                JobKind::ImageEdit,
                JobTarget::new(group.clone(), screen),
                GenerationRequest::new(prompt),
            )
            .await
    }

    pub async fn generate_video(&self, group: &AssetGroupId, screen: Screen, prompt: &str) -> Result<JobId> {
        self.queue
            .enqueue(
                JobKind::VideoGenerate,
                JobTarget::new(group.clone(), screen),
                GenerationRequest::new(prompt),
            )
            .await
    }

    /// Add an existing group to one or more playlists
    pub async fn add_to_playlists(
        &self,
        group: &AssetGroupId,
        playlists: &[PlaylistId],
    ) -> Result<Vec<PlaylistId>> {
        self.registry.add_to_playlists(group, playlists).await
    }

    /// Pin the display to an existing group
    pub async fn set_lock(&self, group: &AssetGroupId) -> Result<DisplayLock> {
        self.registry.lock_display(group).await
    }

    pub async fn clear_lock(&self) -> Result<Option<DisplayLock>> {
        self.rotator.clear_lock().await
    }

    /// What `screen` shows at `at`, using `playlist` or the selected one.
    ///
    /// A group without a version on that screen yields `ScreenContent::Placeholder`.
    pub async fn display_item(
        &self,
        playlist: Option<&PlaylistId>,
        screen: Screen,
        at: DateTime<Utc>,
    ) -> Result<DisplayItem> {
        let locked = self.display.lock().is_some();
        let asset_group = self.rotator.resolve(playlist, at)?;
        let content = match self.registry.current_version(&asset_group, screen).await {
            Ok(v) => ScreenContent::Version {
                version: v.version_number,
                content_ref: v.content_ref,
                media: v.media,
                prompt: v.prompt,
            },
            Err(TripticError::NoCurrentVersion { .. }) => ScreenContent::Placeholder,
            Err(e) => return Err(e),
        };
        Ok(DisplayItem {
            asset_group,
            screen,
            locked,
            content,
        })
    }

    pub async fn status(&self) -> Status {
        let jobs = self.queue.list().await;
        let count = |state: JobState| jobs.iter().filter(|j| j.state == state).count();
        let display = self.display.snapshot();
        Status {
            asset_groups: self.registry.list().len(),
            playlists: display.playlists.len(),
            current_playlist: display.current_playlist.clone(),
            lock: display.lock.clone(),
            queued_jobs: count(JobState::Queued),
            processing_jobs: count(JobState::Processing),
        }
    }

    /// Cancel outstanding jobs and stop background tasks
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::PlaceholderGenerator;
    use crate::storage::implementations::memory::{MemoryStorage, MemoryStores};
    use crate::storage::types::{NewVersion, VersionOrigin};
    use chrono::TimeZone;
    use std::time::Duration;

    async fn engine(stores: &MemoryStores) -> Triptic<MemoryStorage> {
        let generator = Arc::new(PlaceholderGenerator::new().with_size(4, 4));
        Triptic::open(stores, generator, EngineConfig::default())
            .await
            .unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_display_item_rotation_and_placeholder() {
        let stores = MemoryStores::new();
        let t = engine(&stores).await;
        let a = t.create_asset_group("letters/a").await.unwrap();
        let b = t.create_asset_group("letters/b").await.unwrap();
        t.registry()
            .add_version(
                &a,
                Screen::Left,
                NewVersion::new(ContentRef::from_data(b"a"), "letter a", VersionOrigin::Upload),
            )
            .await
            .unwrap();

        let p = PlaylistId::from_string("letters");
        t.display().create_playlist(p.clone(), None).await.unwrap();
        t.add_to_playlists(&a, std::slice::from_ref(&p)).await.unwrap();
        t.add_to_playlists(&b, std::slice::from_ref(&p)).await.unwrap();

        let item = t.display_item(Some(&p), Screen::Left, at(0)).await.unwrap();
        assert_eq!(item.asset_group, a);
        assert!(matches!(item.content, ScreenContent::Version { version: 1, .. }));

        let item = t.display_item(Some(&p), Screen::Left, at(600)).await.unwrap();
        assert_eq!(item.asset_group, b);
        assert_eq!(item.content, ScreenContent::Placeholder);

        assert!(matches!(
            t.display_item(None, Screen::Left, at(0)).await,
            Err(TripticError::NoPlaylistSelected)
        ));
        t.display().select_playlist(Some(p.clone())).await.unwrap();
        assert_eq!(t.display_item(None, Screen::Left, at(0)).await.unwrap().asset_group, a);
    }

    #[tokio::test]
    async fn test_lock_requires_group_and_overrides() {
        let stores = MemoryStores::new();
        let t = engine(&stores).await;
        let missing = AssetGroupId::from_string("missing");
        assert!(matches!(
            t.set_lock(&missing).await,
            Err(TripticError::AssetGroupNotFound(_))
        ));

        let g = t.create_asset_group("pinned").await.unwrap();
        t.set_lock(&g).await.unwrap();
        let item = t.display_item(None, Screen::Center, at(123)).await.unwrap();
        assert!(item.locked);
        assert_eq!(item.asset_group, g);

        t.clear_lock().await.unwrap();
        assert!(t.status().await.lock.is_none());
    }

    #[tokio::test]
    async fn test_rename_cascades_to_playlists() {
        let stores = MemoryStores::new();
        let t = engine(&stores).await;
        let g = t.create_asset_group("old").await.unwrap();
        let p = PlaylistId::from_string("p");
        t.display().create_playlist(p.clone(), None).await.unwrap();
        t.add_to_playlists(&g, std::slice::from_ref(&p)).await.unwrap();
        t.set_lock(&g).await.unwrap();

        let renamed = t.rename_asset_group(&g, "new").await.unwrap();
        assert_eq!(t.display().playlist(&p).unwrap().items, vec![renamed.clone()]);
        assert_eq!(t.display().lock().unwrap().asset_group, renamed);

        t.registry().delete(&renamed).await.unwrap();
        assert!(t.display().playlist(&p).unwrap().is_empty());
        assert!(t.display().lock().is_none());
    }

    #[tokio::test]
    async fn test_placeholder_generation_end_to_end() {
        let stores = MemoryStores::new();
        let t = engine(&stores).await;
        let g = t.create_asset_group("demo").await.unwrap();

        let id = t
            .generate(&g, Screen::Right, GenerationRequest::new("green field"))
            .await
            .unwrap();
        let job = t.queue().wait(&id, Duration::from_millis(5)).await.unwrap();
        assert_eq!(job.state, JobState::Complete);

        let video = t.generate_video(&g, Screen::Right, "").await.unwrap();
        let job = t.queue().wait(&video, Duration::from_millis(5)).await.unwrap();
        assert_eq!(job.state, JobState::Error);
        assert_eq!(
            t.registry().current_version(&g, Screen::Right).await.unwrap().version_number,
            1
        );

        assert!(t.create_asset_group("a/b/c").await.is_err());
        t.shutdown().await;
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_sqlite_state_survives_restart() {
        use crate::storage::implementations::fs::FsBlobStore;
        use crate::storage::implementations::sqlite::{SqliteStorage, SqliteStore, SqliteStores};

        let dir = std::env::temp_dir().join(format!("triptic_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let open_stores = || {
            SqliteStores::new(
                Arc::new(SqliteStore::open(dir.join("triptic.db")).unwrap()),
                Arc::new(FsBlobStore::new(dir.join("blobs"))),
            )
        };
        let generator: Arc<dyn Generator> = Arc::new(PlaceholderGenerator::new().with_size(4, 4));
        let p = PlaylistId::from_string("main");

        let (g, version) = {
            let stores = open_stores();
            let t: Triptic<SqliteStorage> =
                Triptic::open(&stores, generator.clone(), EngineConfig::default())
                    .await
                    .unwrap();
            let g = t.create_asset_group("sea/wave").await.unwrap();
            let id = t
                .generate(&g, Screen::Center, GenerationRequest::new("a wave"))
                .await
                .unwrap();
            let job = t.queue().wait(&id, Duration::from_millis(5)).await.unwrap();
            t.display().create_playlist(p.clone(), Some(30)).await.unwrap();
            t.add_to_playlists(&g, std::slice::from_ref(&p)).await.unwrap();
            t.display().select_playlist(Some(p.clone())).await.unwrap();
            t.shutdown().await;
            (g, job.result.unwrap())
        };

        let stores = open_stores();
        let t: Triptic<SqliteStorage> = Triptic::open(&stores, generator, EngineConfig::default())
            .await
            .unwrap();
        let item = t.display_item(None, Screen::Center, at(0)).await.unwrap();
        assert_eq!(item.asset_group, g);
        match item.content {
            ScreenContent::Version { version: n, content_ref, .. } => {
                assert_eq!(n, version.version);
                assert_eq!(content_ref, version.content_ref);
                assert!(!t.registry().content(&content_ref).await.unwrap().is_empty());
            }
            ScreenContent::Placeholder => panic!("expected committed version"),
        }
        t.shutdown().await;
        let _ = std::fs::remove_dir_all(&dir);
    }
}
