//! Item fetching.

mod profile;
mod types;
mod ytdlp;

pub use profile::{AudioExtraction, FetchProfile};
pub use types::*;
pub use ytdlp::YtDlpFetcher;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Trait for fetch backends.
///
/// A fetch downloads one item into its channel folder and applies the
/// profile's post-processing.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Backend name, for logging.
    fn name(&self) -> &str;

    /// Fetch one item, reporting progress on `progress_tx`.
    async fn fetch(
        &self,
        request: FetchRequest,
        progress_tx: mpsc::Sender<FetchProgress>,
    ) -> Result<FetchOutcome, FetchError>;
}
