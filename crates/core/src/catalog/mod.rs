//! Remote catalog - lists a channel's items and resolves per-item details.

mod types;
mod ytdlp;

pub use types::*;
pub use ytdlp::YtDlpCatalog;

use async_trait::async_trait;

use crate::channel::LiveRule;

/// Trait for remote catalog backends.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Backend name, for logging.
    fn name(&self) -> &str;

    /// List a channel's items, most recent first.
    ///
    /// `search_limit` caps the listing; 0 means no cap. Under
    /// [`LiveRule::Only`] the backend lists the channel's streams instead
    /// of its uploads.
    async fn list_channel(
        &self,
        link: &str,
        search_limit: u64,
        live_rule: LiveRule,
        tuning: &FetchTuning,
    ) -> Result<ChannelListing, CatalogError>;

    /// Upload date and timestamp of a single item.
    async fn item_details(
        &self,
        url: &str,
        tuning: &FetchTuning,
    ) -> Result<ItemDetails, CatalogError>;
}
