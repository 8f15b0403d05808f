//! Mock library notifier for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::channel::NotificationTarget;
use crate::notify::{LibraryNotifier, NotifyContext, NotifyError};

/// Mock implementation of the LibraryNotifier trait.
///
/// # Example
///
/// ```rust,ignore
/// use archivist_core::testing::MockNotifier;
///
/// let plex = Arc::new(MockNotifier::new("Plex"));
/// plex.set_fail(true).await;
///
/// // ... run a sync ...
///
/// assert_eq!(plex.recorded_calls().await.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockNotifier {
    target: String,
    calls: Arc<RwLock<Vec<NotificationTarget>>>,
    fail: Arc<RwLock<bool>>,
}

impl MockNotifier {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            calls: Arc::new(RwLock::new(Vec::new())),
            fail: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// Targets this notifier was asked to refresh.
    pub async fn recorded_calls(&self) -> Vec<NotificationTarget> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl LibraryNotifier for MockNotifier {
    fn target(&self) -> &str {
        &self.target
    }

    async fn refresh(
        &self,
        target: &NotificationTarget,
        _context: &NotifyContext,
    ) -> Result<(), NotifyError> {
        self.calls.write().await.push(target.clone());
        if *self.fail.read().await {
            return Err(NotifyError::UnexpectedStatus {
                status: 500,
                body: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}
