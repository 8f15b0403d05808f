//! A full sync engine wired to mocks.

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use super::{MockCatalog, MockFetcher, MockNotifier, MockTagStore, RecordingEvents};
use crate::channel::{Channel, ChannelRegistry, Settings, SettingsStore};
use crate::events::EventSink;
use crate::library::{LibraryPaths, TagStore};
use crate::notify::LibraryNotifier;
use crate::sync::{ChannelSyncer, SyncOptions, SyncScheduler};

/// Registry, settings, mocks and scheduler over a temporary directory.
///
/// # Example
///
/// ```rust,ignore
/// let harness = SyncHarness::new(vec![fixtures::channel(1, "A", "https://a")]).await?;
/// harness.catalog.set_listing("https://a", fixtures::listing("A", vec![])).await;
/// let summary = harness.scheduler.run().await.unwrap();
/// ```
pub struct SyncHarness {
    pub dir: TempDir,
    pub registry: Arc<ChannelRegistry>,
    pub settings: Arc<SettingsStore>,
    pub catalog: Arc<MockCatalog>,
    pub fetcher: Arc<MockFetcher>,
    pub tags: Arc<MockTagStore>,
    pub events: Arc<RecordingEvents>,
    pub plex: Arc<MockNotifier>,
    pub jellyfin: Arc<MockNotifier>,
    pub scheduler: Arc<SyncScheduler>,
}

impl SyncHarness {
    /// One worker, default options and settings.
    pub async fn new(channels: Vec<Channel>) -> std::io::Result<Self> {
        Self::build(channels, 1, SyncOptions::default(), Settings::default()).await
    }

    pub async fn build(
        channels: Vec<Channel>,
        thread_limit: usize,
        options: SyncOptions,
        settings: Settings,
    ) -> std::io::Result<Self> {
        let dir = TempDir::new()?;
        let library = LibraryPaths::new(dir.path().join("video"), dir.path().join("audio"));
        let registry = Arc::new(ChannelRegistry::with_channels(
            dir.path().join("config/channel_list.json"),
            library,
            channels,
        ));
        let settings = Arc::new(SettingsStore::with_settings(
            dir.path().join("config/settings_config.json"),
            settings,
        ));

        let catalog = Arc::new(MockCatalog::new());
        let fetcher = Arc::new(MockFetcher::new());
        let tags = Arc::new(MockTagStore::new());
        let events = Arc::new(RecordingEvents::new());
        let plex = Arc::new(MockNotifier::new("Plex"));
        let jellyfin = Arc::new(MockNotifier::new("Jellyfin"));

        let syncer = Arc::new(ChannelSyncer::new(
            Arc::clone(&registry),
            Arc::clone(&settings),
            catalog.clone(),
            fetcher.clone(),
            tags.clone() as Arc<dyn TagStore>,
            events.clone() as Arc<dyn EventSink>,
            options,
        ));
        let notifiers: Vec<Arc<dyn LibraryNotifier>> = vec![plex.clone(), jellyfin.clone()];
        let scheduler = Arc::new(SyncScheduler::new(
            Arc::clone(&registry),
            Arc::clone(&settings),
            syncer,
            notifiers,
            events.clone(),
            thread_limit,
        ));

        Ok(Self {
            dir,
            registry,
            settings,
            catalog,
            fetcher,
            tags,
            events,
            plex,
            jellyfin,
            scheduler,
        })
    }

    /// Folder of a video channel with this name.
    pub fn video_folder(&self, name: &str) -> PathBuf {
        self.dir.path().join("video").join(name)
    }

    /// Folder of an audio-only channel with this name.
    pub fn audio_folder(&self, name: &str) -> PathBuf {
        self.dir.path().join("audio").join(name)
    }
}
