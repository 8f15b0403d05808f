//! Outbound events for connected clients.
//!
//! The core publishes through [`EventSink`]; delivery is fire-and-forget
//! and never fails back into the caller.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::channel::{Channel, Settings};
use crate::fetch::FetchProgress;

/// Whether a run is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Run,
    Stop,
}

/// Event pushed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Full channel list snapshot.
    ChannelList { channels: Vec<Channel> },
    /// A channel was created.
    ChannelAdded { channel: Channel },
    /// Run started or stopped. `success` is set on stop.
    SyncState {
        state: RunState,
        #[serde(skip_serializing_if = "Option::is_none")]
        success: Option<bool>,
    },
    /// Progress of the item a channel is fetching.
    ItemProgress {
        channel_id: u64,
        progress: FetchProgress,
    },
    /// Current settings.
    Settings { settings: Settings },
    /// Outcome of a channel edit.
    ChannelSaveMessage { message: String },
    /// Outcome of a settings edit.
    SettingsSaveMessage { message: String },
}

impl SyncEvent {
    /// Event name used for metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChannelList { .. } => "channel_list",
            Self::ChannelAdded { .. } => "channel_added",
            Self::SyncState { .. } => "sync_state",
            Self::ItemProgress { .. } => "item_progress",
            Self::Settings { .. } => "settings",
            Self::ChannelSaveMessage { .. } => "channel_save_message",
            Self::SettingsSaveMessage { .. } => "settings_save_message",
        }
    }
}

/// Receiver of outbound events.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: SyncEvent);

    fn channel_list(&self, channels: Vec<Channel>) {
        self.publish(SyncEvent::ChannelList { channels });
    }

    fn run_started(&self) {
        self.publish(SyncEvent::SyncState {
            state: RunState::Run,
            success: None,
        });
    }

    fn run_stopped(&self, success: bool) {
        self.publish(SyncEvent::SyncState {
            state: RunState::Stop,
            success: Some(success),
        });
    }

    fn item_progress(&self, channel_id: u64, progress: FetchProgress) {
        self.publish(SyncEvent::ItemProgress {
            channel_id,
            progress,
        });
    }
}

/// Broadcast-channel event bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: SyncEvent) {
        // Ignore send errors - they just mean no one is listening
        let _ = self.sender.send(event);
    }
}
