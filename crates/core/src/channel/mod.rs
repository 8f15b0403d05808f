//! Channel records, the channel registry, and runtime settings.

mod registry;
mod settings;
mod types;

pub use registry::{ChannelRegistry, QueuedChannel};
pub use settings::{
    parse_sync_hours, parse_target_map, NotificationTarget, Settings, SettingsStore,
    SettingsUpdate, SyncHoursInput,
};
pub use types::{
    validate_name, Channel, ChannelUpdate, LiveRule, SyncState, PERMANENT_RETENTION,
    SYNCED_AT_FORMAT, UNBOUNDED_LOOKBACK,
};

use thiserror::Error;

/// Errors from the channel registry and the settings store.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Channel not found: {0}")]
    NotFound(u64),

    #[error("Invalid channel name: {0}")]
    InvalidName(String),

    #[error("Channel {0} is being synced")]
    Busy(u64),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
