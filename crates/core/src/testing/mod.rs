//! Testing utilities and mock implementations.
//!
//! Mocks for every collaborator trait, plus a [`SyncHarness`] that wires
//! a complete engine over a temporary directory.
//!
//! # Example
//!
//! ```rust,ignore
//! use archivist_core::testing::{fixtures, SyncHarness};
//!
//! let harness = SyncHarness::new(vec![fixtures::channel(1, "News", LINK)]).await?;
//! harness.catalog.set_listing(LINK, fixtures::listing("News", entries)).await;
//! harness.fetcher.fail_item("abcdefghijk").await;
//!
//! let summary = harness.scheduler.run().await.unwrap();
//! ```

mod harness;
mod mock_catalog;
mod mock_fetcher;
mod mock_notifier;
mod mock_tag_store;
mod recording_events;

pub use harness::SyncHarness;
pub use mock_catalog::{MockCatalog, RecordedListing};
pub use mock_fetcher::MockFetcher;
pub use mock_notifier::MockNotifier;
pub use mock_tag_store::MockTagStore;
pub use recording_events::RecordingEvents;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::{DateTime, Duration, Local, NaiveDate};

    use crate::catalog::{ChannelListing, ItemDetails, LiveStatus, RemoteEntry};
    use crate::channel::Channel;
    use crate::fetch::PendingItem;

    /// A channel with the default settings, a name and a link.
    pub fn channel(id: u64, name: &str, link: &str) -> Channel {
        let mut channel = Channel::new(id);
        channel.name = name.to_string();
        channel.link = link.to_string();
        channel
    }

    /// A regular, non-live listing entry.
    pub fn entry(id: &str, title: &str) -> RemoteEntry {
        RemoteEntry {
            id: id.to_string(),
            title: title.to_string(),
            url: format!("https://www.youtube.com/watch?v={}", id),
            duration: Some(600.0),
            live_status: None,
        }
    }

    /// A listing entry carrying a live status.
    pub fn live_entry(id: &str, status: LiveStatus) -> RemoteEntry {
        RemoteEntry {
            live_status: Some(status),
            duration: None,
            ..entry(id, &format!("Stream {}", id))
        }
    }

    pub fn listing(title: &str, entries: Vec<RemoteEntry>) -> ChannelListing {
        ChannelListing {
            title: Some(title.to_string()),
            channel_id: Some(format!("UC{}", title.replace(' ', ""))),
            entries,
        }
    }

    /// Details of an item uploaded `days` days before `now`.
    pub fn details_days_ago(now: DateTime<Local>, days: i64) -> ItemDetails {
        let uploaded = now - Duration::days(days);
        ItemDetails {
            upload_date: uploaded.date_naive(),
            timestamp: uploaded.timestamp(),
        }
    }

    pub fn pending_item(id: &str, title: &str) -> PendingItem {
        PendingItem {
            id: id.to_string(),
            title: title.to_string(),
            upload_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            url: format!("https://www.youtube.com/watch?v={}", id),
            channel_title: Some("Fixture Channel".to_string()),
        }
    }
}
