//! Bounded-concurrency sync runs with a global error budget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use super::channel::ChannelSyncer;
use super::context::RunContext;
use super::types::{RunOutcome, RunSummary};
use crate::channel::{ChannelRegistry, QueuedChannel, SettingsStore, SyncState};
use crate::events::EventSink;
use crate::metrics;
use crate::notify::{notify_all, LibraryNotifier};

/// Clears the run flag when the run ends, including by panic.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
        metrics::RUN_ACTIVE.set(0);
    }
}

/// Runs every eligible channel, at most `thread_limit` at a time.
pub struct SyncScheduler {
    registry: Arc<ChannelRegistry>,
    settings: Arc<SettingsStore>,
    syncer: Arc<ChannelSyncer>,
    notifiers: Vec<Arc<dyn LibraryNotifier>>,
    events: Arc<dyn EventSink>,
    thread_limit: usize,
    running: Arc<AtomicBool>,
}

impl SyncScheduler {
    pub fn new(
        registry: Arc<ChannelRegistry>,
        settings: Arc<SettingsStore>,
        syncer: Arc<ChannelSyncer>,
        notifiers: Vec<Arc<dyn LibraryNotifier>>,
        events: Arc<dyn EventSink>,
        thread_limit: usize,
    ) -> Self {
        Self {
            registry,
            settings,
            syncer,
            notifiers,
            events,
            thread_limit: thread_limit.max(1),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a run is active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn try_claim(&self) -> Option<RunGuard> {
        if self.running.swap(true, Ordering::SeqCst) {
            info!("Sync already running, not starting another one");
            metrics::RUNS_REFUSED.inc();
            return None;
        }
        metrics::RUN_ACTIVE.set(1);
        Some(RunGuard(Arc::clone(&self.running)))
    }

    /// Run once. Returns `None` when another run is already active.
    pub async fn run(&self) -> Option<RunSummary> {
        let guard = self.try_claim()?;
        let summary = self.execute().await;
        drop(guard);
        Some(summary)
    }

    /// Start a run in the background. Returns whether it started.
    pub fn trigger_manual(self: &Arc<Self>) -> bool {
        let Some(guard) = self.try_claim() else {
            warn!("Cannot start manual sync, previous sync still running");
            return false;
        };

        warn!("Manual sync triggered");
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            scheduler.execute().await;
        });
        true
    }

    async fn execute(&self) -> RunSummary {
        let started = Instant::now();
        let ctx = Arc::new(RunContext::new(Local::now()));

        let channels = self.registry.len().await;
        info!(channels, "Sync run started");
        self.events.run_started();

        let queued = self
            .registry
            .queue_where(|channel| {
                if channel.paused {
                    info!(channel = %channel.name, "Channel paused, skipping");
                    false
                } else if channel.last_synced.is_active() {
                    info!(channel = %channel.name, "Channel already queued or in progress, skipping");
                    false
                } else {
                    info!(channel = %channel.name, "Adding channel to sync queue");
                    true
                }
            })
            .await;
        let admitted = queued.len();
        self.events.channel_list(self.registry.list().await);

        let dispatched = self.dispatch(queued, &ctx).await;

        if self.registry.is_empty().await {
            warn!("Channel list empty");
        } else if let Err(e) = self.registry.persist().await {
            error!(error = %e, "Failed to save channel list");
        }

        self.notify_if_needed(&ctx).await;

        let failures = ctx.failures();
        let outcome = RunOutcome::from_counts(admitted, failures);
        match outcome {
            RunOutcome::Complete => info!(admitted, "Sync finished, all channels completed"),
            RunOutcome::Partial => warn!(failures, admitted, "Sync finished with some errors"),
            RunOutcome::TotalFailure => error!(failures, admitted, "Sync failed completely"),
        }

        metrics::RUNS_TOTAL
            .with_label_values(&[outcome.as_str()])
            .inc();
        metrics::RUN_DURATION
            .with_label_values(&[outcome.as_str()])
            .observe(started.elapsed().as_secs_f64());

        self.events.run_stopped(outcome.is_success());
        self.events.channel_list(self.registry.list().await);

        RunSummary {
            admitted,
            dispatched,
            failures,
            files_changed: ctx.files_changed(),
            outcome,
        }
    }

    /// Spawn admitted channels under the worker cap until the budget runs out.
    async fn dispatch(&self, queued: Vec<QueuedChannel>, ctx: &Arc<RunContext>) -> usize {
        let semaphore = Arc::new(Semaphore::new(self.thread_limit));
        let mut tasks = JoinSet::new();
        let mut dispatched = 0;
        let mut queued = queued.into_iter();

        while let Some(next) = queued.next() {
            let permit = match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    self.restore(std::iter::once(next).chain(queued)).await;
                    break;
                }
            };

            if ctx.budget_exhausted() {
                error!(
                    failures = ctx.failures(),
                    "Too many errors, no further channels will be started"
                );
                self.restore(std::iter::once(next).chain(queued)).await;
                break;
            }

            dispatched += 1;
            let syncer = Arc::clone(&self.syncer);
            let registry = Arc::clone(&self.registry);
            let ctx = Arc::clone(ctx);
            let channel = next.channel;
            tasks.spawn(async move {
                // Held until the outcome is recorded so the next admission sees it
                let _permit = permit;
                let channel_id = channel.id;
                let task_ctx = Arc::clone(&ctx);
                // Nested spawn so a panicking channel surfaces as a JoinError
                let result = tokio::spawn(async move {
                    syncer.sync_channel(&channel, &task_ctx).await
                })
                .await;

                if let Err(e) = result {
                    error!(channel_id, error = %e, "Channel task panicked");
                    ctx.record_failure();
                    metrics::CHANNELS_PROCESSED
                        .with_label_values(&["failed"])
                        .inc();
                    if let Err(e) = registry.set_state(channel_id, SyncState::Failed).await {
                        warn!(channel_id, error = %e, "Failed to record channel state");
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Channel task failed to join");
            }
        }

        dispatched
    }

    /// Put never-dispatched channels back in the state they had.
    async fn restore(&self, channels: impl Iterator<Item = QueuedChannel>) {
        for queued in channels {
            info!(channel = %queued.channel.name, "Channel not started, restoring state");
            if let Err(e) = self
                .registry
                .set_state(queued.channel.id, queued.previous)
                .await
            {
                warn!(channel = %queued.channel.name, error = %e, "Failed to restore channel state");
            }
        }
    }

    async fn notify_if_needed(&self, ctx: &RunContext) {
        if !ctx.files_changed() {
            info!("Library refresh not required");
            return;
        }

        let settings = self.settings.get().await;
        if settings.notification_targets().is_empty() {
            info!("No media servers configured for library refresh");
            return;
        }

        let report = notify_all(&self.notifiers, &settings).await;
        if !report.failed.is_empty() {
            warn!(failed = ?report.failed, "Some library refreshes failed");
        }
    }
}
