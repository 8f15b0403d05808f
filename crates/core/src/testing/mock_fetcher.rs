//! Mock fetcher for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use crate::fetch::{FetchError, FetchOutcome, FetchProgress, FetchRequest, Fetcher};
use crate::library::sanitize_title;

/// Mock implementation of the Fetcher trait.
///
/// A successful fetch writes a small file named after the item title into
/// the request folder, so scans and recounts see it.
///
/// # Example
///
/// ```rust,ignore
/// use archivist_core::testing::MockFetcher;
///
/// let fetcher = MockFetcher::new();
/// fetcher.fail_item("abcdefghijk").await;
///
/// // ... run a sync ...
///
/// let requests = fetcher.recorded_requests().await;
/// assert_eq!(requests[0].item.id, "abcdefghijk");
/// ```
#[derive(Debug)]
pub struct MockFetcher {
    requests: Arc<RwLock<Vec<FetchRequest>>>,
    failing_items: Arc<RwLock<HashSet<String>>>,
    panicking_items: Arc<RwLock<HashSet<String>>>,
    fail_all: Arc<RwLock<bool>>,
    extension: Arc<RwLock<String>>,
    progress_steps: Arc<RwLock<Vec<f32>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(RwLock::new(Vec::new())),
            failing_items: Arc::new(RwLock::new(HashSet::new())),
            panicking_items: Arc::new(RwLock::new(HashSet::new())),
            fail_all: Arc::new(RwLock::new(false)),
            extension: Arc::new(RwLock::new("mp4".to_string())),
            progress_steps: Arc::new(RwLock::new(vec![50.0, 100.0])),
            delay: Arc::new(RwLock::new(None)),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make fetching the item with this id fail.
    pub async fn fail_item(&self, id: &str) {
        self.failing_items.write().await.insert(id.to_string());
    }

    /// Make fetching the item with this id panic.
    pub async fn panic_on_item(&self, id: &str) {
        self.panicking_items.write().await.insert(id.to_string());
    }

    pub async fn set_fail_all(&self, fail: bool) {
        *self.fail_all.write().await = fail;
    }

    /// Extension of produced files (default `mp4`).
    pub async fn set_extension(&self, ext: &str) {
        *self.extension.write().await = ext.to_string();
    }

    /// Percentages reported during each fetch.
    pub async fn set_progress_steps(&self, steps: Vec<f32>) {
        *self.progress_steps.write().await = steps;
    }

    /// Simulated fetch duration.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn recorded_requests(&self) -> Vec<FetchRequest> {
        self.requests.read().await.clone()
    }

    pub async fn fetch_count(&self) -> usize {
        self.requests.read().await.len()
    }

    /// Highest number of fetches that ran at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    async fn simulate(
        &self,
        request: &FetchRequest,
        progress_tx: &mpsc::Sender<FetchProgress>,
    ) -> Result<FetchOutcome, FetchError> {
        if let Some(delay) = *self.delay.read().await {
            tokio::time::sleep(delay).await;
        }

        if self.panicking_items.read().await.contains(&request.item.id) {
            panic!("simulated panic fetching {}", request.item.id);
        }

        if *self.fail_all.read().await || self.failing_items.read().await.contains(&request.item.id)
        {
            return Err(FetchError::failed(
                format!("simulated failure for {}", request.item.id),
                None,
            ));
        }

        let steps = self.progress_steps.read().await.clone();
        for percent in steps {
            // Ignore send errors - the receiver may have gone away
            let _ = progress_tx
                .send(FetchProgress {
                    item_id: request.item.id.clone(),
                    percent,
                    total: Some("1.00MiB".to_string()),
                    speed: None,
                    eta: None,
                    fragment_index: None,
                    is_live: false,
                })
                .await;
        }

        let ext = self.extension.read().await.clone();
        tokio::fs::create_dir_all(&request.folder).await?;
        let path = request
            .folder
            .join(format!("{}.{}", sanitize_title(&request.item.title), ext));
        tokio::fs::write(&path, request.item.id.as_bytes()).await?;

        Ok(FetchOutcome { path: Some(path) })
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch(
        &self,
        request: FetchRequest,
        progress_tx: mpsc::Sender<FetchProgress>,
    ) -> Result<FetchOutcome, FetchError> {
        self.requests.write().await.push(request.clone());

        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        let result = self.simulate(&request, &progress_tx).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
