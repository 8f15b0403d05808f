use std::sync::Arc;

use archivist_core::{
    ChannelRegistry, Config, EventBus, EventSink, SanitizedConfig, SettingsStore, SyncScheduler,
};

/// Shared application state
pub struct AppState {
    config: Config,
    registry: Arc<ChannelRegistry>,
    settings: Arc<SettingsStore>,
    scheduler: Arc<SyncScheduler>,
    events: EventBus,
}

impl AppState {
    /// `events` must be the bus the scheduler publishes to, otherwise
    /// WebSocket clients never see run progress.
    pub fn new(
        config: Config,
        registry: Arc<ChannelRegistry>,
        settings: Arc<SettingsStore>,
        scheduler: Arc<SyncScheduler>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            registry,
            settings,
            scheduler,
            events,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn scheduler(&self) -> &Arc<SyncScheduler> {
        &self.scheduler
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Push the current channel list to every client.
    pub async fn broadcast_channel_list(&self) {
        let channels = self.registry.list().await;
        self.events.channel_list(channels);
    }
}
