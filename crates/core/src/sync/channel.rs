//! Syncs one channel end to end.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::context::RunContext;
use super::diff::{self, DiffOptions};
use super::types::{ChannelReport, SyncError, MAX_CONSECUTIVE_ITEM_FAILURES};
use crate::catalog::{FetchTuning, RemoteCatalog};
use crate::channel::{validate_name, Channel, ChannelRegistry, Settings, SettingsStore, SyncState};
use crate::config::{Config, MediaConfig};
use crate::events::EventSink;
use crate::fetch::{FetchProfile, FetchRequest, Fetcher, PendingItem, ProgressThrottle};
use crate::library::{cleanup, count_media, scan_folder, RetentionPolicy, TagStore};
use crate::metrics;

/// File name of the optional cookie jar in the config directory.
pub const COOKIES_FILE: &str = "cookies.txt";

/// Options shared by every channel of every run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub media: MediaConfig,
    pub defer_hours: f64,
    pub include_id_in_filename: bool,
    /// Cookie jar handed to the backends when the file exists.
    pub cookies: Option<PathBuf>,
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            media: config.media.clone(),
            defer_hours: config.sync.defer_hours,
            include_id_in_filename: config.sync.include_id_in_filename,
            cookies: Some(config.paths.config_dir.join(COOKIES_FILE)),
        }
    }

    fn tuning(&self, settings: &Settings) -> FetchTuning {
        FetchTuning {
            slow: settings.youtube_slow,
            ignore_tls_errors: settings.ignore_ssl_errors,
            cookies: self.cookies.clone().filter(|p| p.is_file()),
        }
    }
}

/// Drives a single channel through scan, diff, fetch, cleanup and recount.
pub struct ChannelSyncer {
    registry: Arc<ChannelRegistry>,
    settings: Arc<SettingsStore>,
    catalog: Arc<dyn RemoteCatalog>,
    fetcher: Arc<dyn Fetcher>,
    tags: Arc<dyn TagStore>,
    events: Arc<dyn EventSink>,
    options: SyncOptions,
}

impl ChannelSyncer {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        settings: Arc<SettingsStore>,
        catalog: Arc<dyn RemoteCatalog>,
        fetcher: Arc<dyn Fetcher>,
        tags: Arc<dyn TagStore>,
        events: Arc<dyn EventSink>,
        options: SyncOptions,
    ) -> Self {
        Self {
            registry,
            settings,
            catalog,
            fetcher,
            tags,
            events,
            options,
        }
    }

    /// Sync one admitted channel.
    ///
    /// Never fails: errors are logged, the channel ends up `Failed` and at
    /// most one failure is counted on `ctx`.
    pub async fn sync_channel(&self, channel: &Channel, ctx: &RunContext) -> ChannelReport {
        let mut report = ChannelReport {
            channel_id: channel.id,
            ..Default::default()
        };

        if let Err(e) = self.process(channel, ctx, &mut report).await {
            error!(channel = %channel.name, error = %e, "Error processing channel");
            count_failure(ctx, &mut report);
        }

        let state = if report.failed {
            warn!(channel = %channel.name, "Channel processed with problems");
            metrics::CHANNELS_PROCESSED
                .with_label_values(&["failed"])
                .inc();
            SyncState::Failed
        } else {
            info!(
                channel = %channel.name,
                fetched = report.fetched,
                deleted = report.deleted,
                "Channel processed"
            );
            metrics::CHANNELS_PROCESSED
                .with_label_values(&["synced"])
                .inc();
            SyncState::synced_at(Local::now())
        };

        if let Err(e) = self.registry.set_state(channel.id, state).await {
            warn!(channel = %channel.name, error = %e, "Failed to record channel state");
        }
        self.refresh_clients().await;

        report
    }

    async fn process(
        &self,
        channel: &Channel,
        ctx: &RunContext,
        report: &mut ChannelReport,
    ) -> Result<(), SyncError> {
        self.registry
            .set_state(channel.id, SyncState::InProgress)
            .await?;
        self.refresh_clients().await;

        validate_name(&channel.name).map_err(SyncError::InvalidConfig)?;
        let folder = self
            .registry
            .library()
            .channel_folder(channel)
            .ok_or_else(|| SyncError::InvalidConfig("empty channel name".to_string()))?;
        tokio::fs::create_dir_all(&folder)
            .await
            .map_err(|e| SyncError::Folder {
                path: folder.display().to_string(),
                reason: e.to_string(),
            })?;

        info!(channel = %channel.name, folder = %folder.display(), "Scanning local files");
        let presence = {
            let folder = folder.clone();
            let tags = Arc::clone(&self.tags);
            tokio::task::spawn_blocking(move || scan_folder(&folder, tags.as_ref())).await?
        };

        let settings = self.settings.get().await;
        let tuning = self.options.tuning(&settings);
        let diff_options = DiffOptions {
            defer_hours: self.options.defer_hours,
            include_id_in_filename: self.options.include_id_in_filename,
            now: Local::now(),
        };

        info!(channel = %channel.name, link = %channel.link, "Resolving remote items");
        match diff::resolve(
            channel,
            &presence,
            self.catalog.as_ref(),
            &tuning,
            &diff_options,
        )
        .await
        {
            Ok(resolution) => {
                self.registry
                    .set_remote_count(channel.id, resolution.listed as u64)
                    .await?;
                if resolution.pending.is_empty() {
                    info!(channel = %channel.name, "Nothing to fetch");
                } else {
                    self.fetch_items(channel, &folder, resolution.pending, tuning, ctx, report)
                        .await;
                }
            }
            Err(e) => {
                warn!(channel = %channel.name, error = %e, "Failed to resolve remote items");
                count_failure(ctx, report);
            }
        }

        info!(channel = %channel.name, keep_days = channel.keep_days, "Clearing old files");
        let policy = RetentionPolicy::for_channel(channel, self.options.media.subtitles);
        let cleaned = {
            let folder = folder.clone();
            let tags = Arc::clone(&self.tags);
            tokio::task::spawn_blocking(move || {
                cleanup(&folder, &policy, tags.as_ref(), Local::now())
            })
            .await?
        };
        if cleaned.changed_files() {
            ctx.mark_files_changed();
            metrics::FILES_DELETED.inc_by(cleaned.deleted as u64);
        }
        report.deleted = cleaned.deleted;

        self.recount(channel.id, &folder).await?;
        Ok(())
    }

    async fn fetch_items(
        &self,
        channel: &Channel,
        folder: &Path,
        items: Vec<PendingItem>,
        tuning: FetchTuning,
        ctx: &RunContext,
        report: &mut ChannelReport,
    ) {
        let profile = FetchProfile::for_channel(channel, &self.options.media);
        let total = items.len();
        let mut consecutive_failures = 0;

        for (idx, item) in items.into_iter().enumerate() {
            info!(
                channel = %channel.name,
                item = %item.id,
                title = %item.title,
                "Fetching item [{}/{}]",
                idx + 1,
                total
            );

            let item_id = item.id.clone();
            let request = FetchRequest {
                item,
                folder: folder.to_path_buf(),
                profile: profile.clone(),
                tuning: tuning.clone(),
            };

            let (progress_tx, progress_rx) = mpsc::channel(32);
            let forwarder = self.spawn_progress_forwarder(channel, progress_rx);
            let result = self.fetcher.fetch(request, progress_tx).await;
            if let Err(e) = forwarder.await {
                debug!(error = %e, "Progress forwarder ended abnormally");
            }

            match result {
                Ok(outcome) => {
                    consecutive_failures = 0;
                    report.fetched += 1;
                    metrics::ITEMS_FETCHED.inc();
                    ctx.mark_files_changed();
                    info!(
                        channel = %channel.name,
                        item = %item_id,
                        path = ?outcome.path,
                        "Item fetched"
                    );
                    if let Err(e) = self.recount(channel.id, folder).await {
                        warn!(channel = %channel.name, error = %e, "Failed to update item count");
                    }
                    self.refresh_clients().await;
                }
                Err(e) => {
                    consecutive_failures += 1;
                    report.failed_items += 1;
                    metrics::ITEMS_FAILED.inc();
                    error!(channel = %channel.name, item = %item_id, error = %e, "Failed to fetch item");

                    if consecutive_failures >= MAX_CONSECUTIVE_ITEM_FAILURES {
                        error!(channel = %channel.name, "Too many fetch failures in succession, aborting");
                        count_failure(ctx, report);
                        break;
                    }
                }
            }
        }
    }

    fn spawn_progress_forwarder(
        &self,
        channel: &Channel,
        mut progress_rx: mpsc::Receiver<crate::fetch::FetchProgress>,
    ) -> tokio::task::JoinHandle<()> {
        let events = Arc::clone(&self.events);
        let channel_id = channel.id;
        let channel_name = channel.name.clone();

        tokio::spawn(async move {
            let mut throttle = ProgressThrottle::new();
            while let Some(progress) = progress_rx.recv().await {
                if throttle.should_log(&progress) {
                    if progress.is_live {
                        info!(
                            channel = %channel_name,
                            item = %progress.item_id,
                            fragment = progress.fragment_index.unwrap_or(0),
                            "Live fetch in progress"
                        );
                    } else {
                        info!(
                            channel = %channel_name,
                            item = %progress.item_id,
                            "Fetched {:.1}% of {} at {} with ETA {}",
                            progress.percent,
                            progress.total.as_deref().unwrap_or("unknown"),
                            progress.speed.as_deref().unwrap_or("unknown"),
                            progress.eta.as_deref().unwrap_or("unknown"),
                        );
                    }
                }
                events.item_progress(channel_id, progress);
            }
        })
    }

    async fn recount(&self, channel_id: u64, folder: &Path) -> Result<(), SyncError> {
        let folder = folder.to_path_buf();
        let count = tokio::task::spawn_blocking(move || count_media(&folder))
            .await?
            .unwrap_or_default();
        self.registry.set_counts(channel_id, count).await?;
        Ok(())
    }

    async fn refresh_clients(&self) {
        self.events.channel_list(self.registry.list().await);
    }
}

fn count_failure(ctx: &RunContext, report: &mut ChannelReport) {
    if report.failed {
        return;
    }
    report.failed = true;
    let total = ctx.record_failure();
    warn!(channel_id = report.channel_id, failures = total, "Run failure counter increased");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, SyncHarness};
    use tempfile::TempDir;

    #[test]
    fn test_tuning_follows_settings_and_cookie_file() {
        let dir = TempDir::new().unwrap();
        let cookies = dir.path().join(COOKIES_FILE);
        let options = SyncOptions {
            cookies: Some(cookies.clone()),
            ..Default::default()
        };
        let settings = Settings {
            youtube_slow: true,
            ignore_ssl_errors: true,
            ..Default::default()
        };

        let tuning = options.tuning(&settings);
        assert!(tuning.slow);
        assert!(tuning.ignore_tls_errors);
        assert_eq!(tuning.cookies, None);

        std::fs::write(&cookies, "# Netscape HTTP Cookie File\n").unwrap();
        assert_eq!(options.tuning(&settings).cookies, Some(cookies));
    }

    #[test]
    fn test_options_from_config() {
        let mut config = Config::default();
        config.sync.defer_hours = 2.5;
        config.paths.config_dir = PathBuf::from("/etc/archivist");

        let options = SyncOptions::from_config(&config);
        assert_eq!(options.defer_hours, 2.5);
        assert!(options.include_id_in_filename);
        assert_eq!(
            options.cookies,
            Some(PathBuf::from("/etc/archivist/cookies.txt"))
        );
    }

    #[tokio::test]
    async fn test_sync_channel_counts_one_failure_for_listing_and_fetch_problems() {
        let link = "https://www.youtube.com/@A";
        let harness = SyncHarness::new(vec![fixtures::channel(7, "A", link)])
            .await
            .unwrap();
        harness.catalog.fail_listing(link).await;
        let syncer = ChannelSyncer::new(
            Arc::clone(&harness.registry),
            Arc::clone(&harness.settings),
            harness.catalog.clone(),
            harness.fetcher.clone(),
            harness.tags.clone(),
            harness.events.clone(),
            SyncOptions::default(),
        );
        let ctx = RunContext::default();
        let channel = harness.registry.get(7).await.unwrap();

        let report = syncer.sync_channel(&channel, &ctx).await;

        assert!(report.failed);
        assert_eq!(ctx.failures(), 1);
        assert!(harness.video_folder("A").is_dir());
        assert_eq!(
            harness.registry.get(7).await.unwrap().last_synced,
            SyncState::Failed
        );
        assert!(harness.events.count("channel_list") >= 2);
    }
}
