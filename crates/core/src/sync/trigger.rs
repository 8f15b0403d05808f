//! Starts scheduled runs during the configured sync hours.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Timelike};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use super::scheduler::SyncScheduler;
use super::types::RunSummary;
use crate::channel::SettingsStore;

/// Time left until the start of the next hour.
pub fn until_next_hour(now: DateTime<Local>) -> Duration {
    let into_hour = Duration::from_secs(u64::from(now.minute() * 60 + now.second()))
        + Duration::from_nanos(u64::from(now.nanosecond() % 1_000_000_000));
    Duration::from_secs(3600).saturating_sub(into_hour)
}

/// Wakes the scheduler at the configured hours.
pub struct SyncTrigger {
    scheduler: Arc<SyncScheduler>,
    settings: Arc<SettingsStore>,
    check_interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
}

impl SyncTrigger {
    pub fn new(
        scheduler: Arc<SyncScheduler>,
        settings: Arc<SettingsStore>,
        check_interval: Duration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            scheduler,
            settings,
            check_interval,
            shutdown_tx,
        }
    }

    /// Run once if `now` falls in a sync hour.
    pub async fn check(&self, now: DateTime<Local>) -> Option<RunSummary> {
        let settings = self.settings.get().await;
        if !settings.is_sync_hour(now.hour()) {
            return None;
        }
        info!(
            hour = now.hour(),
            schedule = ?settings.sync_start_times,
            "Time to start sync"
        );
        self.scheduler.run().await
    }

    /// Spawn the schedule loop.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let trigger = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(
                interval_secs = trigger.check_interval.as_secs(),
                "Sync schedule checker started"
            );
            loop {
                let wait = match trigger.check(Local::now()).await {
                    Some(_) => {
                        let wait = until_next_hour(Local::now());
                        info!(sleep_secs = wait.as_secs(), "Sync complete, sleeping until next hour");
                        wait
                    }
                    None => trigger.check_interval,
                };

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Sync schedule checker received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(wait) => {}
                }
            }
            info!("Sync schedule checker stopped");
        })
    }

    /// Stop the schedule loop. A run in progress finishes on its own.
    pub fn stop(&self) {
        // Ignore send errors - the loop may already be gone
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_until_next_hour() {
        let now = Local.with_ymd_and_hms(2024, 5, 15, 14, 45, 30).single().unwrap();
        assert_eq!(until_next_hour(now), Duration::from_secs(14 * 60 + 30));

        let on_the_hour = Local.with_ymd_and_hms(2024, 5, 15, 9, 0, 0).single().unwrap();
        assert_eq!(until_next_hour(on_the_hour), Duration::from_secs(3600));
    }
}
