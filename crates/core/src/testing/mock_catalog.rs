//! Mock remote catalog for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::catalog::{
    CatalogError, ChannelListing, FetchTuning, ItemDetails, RemoteCatalog,
};
use crate::channel::LiveRule;

/// A recorded listing request for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedListing {
    pub link: String,
    pub search_limit: u64,
    pub live_rule: LiveRule,
}

/// Mock implementation of the RemoteCatalog trait.
///
/// Listings are keyed by channel link and details by item url. Anything
/// not configured fails, like an unreachable backend would.
///
/// # Example
///
/// ```rust,ignore
/// use archivist_core::testing::{fixtures, MockCatalog};
///
/// let catalog = MockCatalog::new();
/// let entry = fixtures::entry("abcdefghijk", "First upload");
/// catalog.set_details(&entry.url, fixtures::details_days_ago(now, 1)).await;
/// catalog.set_listing("https://www.youtube.com/@Chan", fixtures::listing("Chan", vec![entry])).await;
///
/// // A channel whose listing always fails
/// catalog.fail_listing("https://www.youtube.com/@Broken").await;
/// ```
#[derive(Debug, Default)]
pub struct MockCatalog {
    listings: Arc<RwLock<HashMap<String, ChannelListing>>>,
    failing_listings: Arc<RwLock<HashSet<String>>>,
    details: Arc<RwLock<HashMap<String, ItemDetails>>>,
    listing_calls: Arc<RwLock<Vec<RecordedListing>>>,
    detail_calls: Arc<RwLock<Vec<String>>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the listing returned for a channel link.
    pub async fn set_listing(&self, link: &str, listing: ChannelListing) {
        self.listings.write().await.insert(link.to_string(), listing);
    }

    /// Make listing a channel link fail.
    pub async fn fail_listing(&self, link: &str) {
        self.failing_listings.write().await.insert(link.to_string());
    }

    /// Configure the details returned for an item url.
    pub async fn set_details(&self, url: &str, details: ItemDetails) {
        self.details.write().await.insert(url.to_string(), details);
    }

    pub async fn recorded_listings(&self) -> Vec<RecordedListing> {
        self.listing_calls.read().await.clone()
    }

    /// Urls whose details were requested, in call order.
    pub async fn recorded_details(&self) -> Vec<String> {
        self.detail_calls.read().await.clone()
    }
}

#[async_trait]
impl RemoteCatalog for MockCatalog {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_channel(
        &self,
        link: &str,
        search_limit: u64,
        live_rule: LiveRule,
        _tuning: &FetchTuning,
    ) -> Result<ChannelListing, CatalogError> {
        self.listing_calls.write().await.push(RecordedListing {
            link: link.to_string(),
            search_limit,
            live_rule,
        });

        if self.failing_listings.read().await.contains(link) {
            return Err(CatalogError::CommandFailed(format!(
                "simulated listing failure for {}",
                link
            )));
        }

        let mut listing = self
            .listings
            .read()
            .await
            .get(link)
            .cloned()
            .ok_or_else(|| CatalogError::CommandFailed(format!("no listing for {}", link)))?;

        if search_limit > 0 {
            listing.entries.truncate(search_limit as usize);
        }
        Ok(listing)
    }

    async fn item_details(
        &self,
        url: &str,
        _tuning: &FetchTuning,
    ) -> Result<ItemDetails, CatalogError> {
        self.detail_calls.write().await.push(url.to_string());
        self.details
            .read()
            .await
            .get(url)
            .copied()
            .ok_or(CatalogError::MissingField("upload_date"))
    }
}
