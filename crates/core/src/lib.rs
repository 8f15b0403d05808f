pub mod catalog;
pub mod channel;
pub mod config;
pub mod events;
pub mod fetch;
pub mod library;
pub mod metrics;
pub mod notify;
pub mod sync;
pub mod testing;

pub use catalog::{
    CatalogError, ChannelListing, FetchTuning, ItemDetails, LiveStatus, RemoteCatalog,
    RemoteEntry, YtDlpCatalog,
};
pub use channel::{
    Channel, ChannelRegistry, ChannelUpdate, LiveRule, NotificationTarget, RegistryError,
    Settings, SettingsStore, SettingsUpdate, SyncState,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use events::{EventBus, EventSink, RunState, SyncEvent};
pub use fetch::{FetchError, FetchProfile, FetchProgress, FetchRequest, Fetcher, YtDlpFetcher};
pub use library::{LibraryPaths, LoftyTagStore, TagError, TagStore};
pub use notify::{default_notifiers, LibraryNotifier, NotifyError};
pub use sync::{
    ChannelSyncer, RunOutcome, RunSummary, SyncError, SyncOptions, SyncScheduler, SyncTrigger,
};
