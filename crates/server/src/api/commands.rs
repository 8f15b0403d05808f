//! Client commands.
//!
//! REST handlers and WebSocket messages both end up here, so every edit
//! publishes the same events regardless of where it came from.

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use archivist_core::{
    Channel, ChannelUpdate, EventSink, RegistryError, RunState, Settings, SettingsUpdate,
    SyncEvent,
};

use crate::state::AppState;

/// Command sent by a WebSocket client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    AddChannel,
    RemoveChannel { id: u64 },
    SaveChannel { channel: ChannelUpdate },
    PauseChannel { id: u64, paused: bool },
    GetSettings,
    SaveSettings { settings: SettingsUpdate },
    /// Start a manual run.
    Sync,
}

impl Command {
    /// Command name used for metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AddChannel => "add_channel",
            Self::RemoveChannel { .. } => "remove_channel",
            Self::SaveChannel { .. } => "save_channel",
            Self::PauseChannel { .. } => "pause_channel",
            Self::GetSettings => "get_settings",
            Self::SaveSettings { .. } => "save_settings",
            Self::Sync => "sync",
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Sync already running")]
    SyncRunning,
}

pub async fn add_channel(state: &AppState) -> Result<Channel, CommandError> {
    let channel = state.registry().add().await?;
    state.events().publish(SyncEvent::ChannelAdded {
        channel: channel.clone(),
    });
    state.broadcast_channel_list().await;
    Ok(channel)
}

/// Remove a channel. Refused while a run is working on it.
pub async fn remove_channel(state: &AppState, id: u64) -> Result<Channel, CommandError> {
    let removed = state.registry().remove_if_idle(id).await.inspect_err(|e| {
        if matches!(e, RegistryError::Busy(_)) {
            warn!(id, "Refusing to remove channel during sync");
        }
    })?;
    state.broadcast_channel_list().await;
    Ok(removed)
}

pub async fn save_channel(
    state: &AppState,
    update: &ChannelUpdate,
) -> Result<Channel, CommandError> {
    let channel = state.registry().update(update).await?;
    state.events().publish(SyncEvent::ChannelSaveMessage {
        message: format!("Saved {}", channel.name),
    });
    state.broadcast_channel_list().await;
    Ok(channel)
}

pub async fn pause_channel(
    state: &AppState,
    id: u64,
    paused: bool,
) -> Result<Channel, CommandError> {
    let channel = state.registry().set_paused(id, paused).await?;
    state.broadcast_channel_list().await;
    Ok(channel)
}

pub async fn save_settings(
    state: &AppState,
    update: SettingsUpdate,
) -> Result<Settings, CommandError> {
    let settings = state.settings().apply(update).await?;
    state.events().publish(SyncEvent::SettingsSaveMessage {
        message: "Settings saved".to_string(),
    });
    state.events().publish(SyncEvent::Settings {
        settings: settings.clone(),
    });
    Ok(settings)
}

/// Start a manual run in the background.
pub fn start_sync(state: &AppState) -> Result<(), CommandError> {
    if state.scheduler().trigger_manual() {
        Ok(())
    } else {
        Err(CommandError::SyncRunning)
    }
}

/// Current run state as an event.
pub fn sync_state(state: &AppState) -> SyncEvent {
    let run_state = if state.scheduler().is_running() {
        RunState::Run
    } else {
        RunState::Stop
    };
    SyncEvent::SyncState {
        state: run_state,
        success: None,
    }
}

/// Execute a WebSocket command.
///
/// Returns the event to send back to the issuing client only. Everything
/// else goes out through the event bus.
pub async fn handle(state: &AppState, command: Command) -> Option<SyncEvent> {
    info!(command = command.kind(), "Handling client command");

    let channel_result = match command {
        Command::AddChannel => add_channel(state).await.map(drop),
        Command::RemoveChannel { id } => remove_channel(state, id).await.map(drop),
        Command::SaveChannel { channel } => save_channel(state, &channel).await.map(drop),
        Command::PauseChannel { id, paused } => {
            pause_channel(state, id, paused).await.map(drop)
        }
        Command::GetSettings => {
            return Some(SyncEvent::Settings {
                settings: state.settings().get().await,
            });
        }
        Command::SaveSettings { settings } => {
            return save_settings(state, settings).await.err().map(|e| {
                warn!(error = %e, "Settings save failed");
                SyncEvent::SettingsSaveMessage {
                    message: e.to_string(),
                }
            });
        }
        Command::Sync => {
            return start_sync(state).err().map(|_| sync_state(state));
        }
    };

    channel_result.err().map(|e| {
        warn!(error = %e, "Channel command failed");
        SyncEvent::ChannelSaveMessage {
            message: e.to_string(),
        }
    })
}
