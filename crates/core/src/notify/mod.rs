//! Outbound "refresh library" notifications to media-index servers.

mod jellyfin;
mod plex;

pub use jellyfin::JellyfinNotifier;
pub use plex::PlexNotifier;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use thiserror::Error;
use tracing::{info, warn};

use crate::channel::{NotificationTarget, Settings};
use crate::metrics;

/// Errors from a notification target.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected response {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Library section not found: {0}")]
    SectionNotFound(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

/// Per-call options taken from the current settings.
#[derive(Debug, Clone)]
pub struct NotifyContext {
    pub library_name: String,
    pub ignore_tls_errors: bool,
}

impl NotifyContext {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            library_name: settings.media_server_library_name.clone(),
            ignore_tls_errors: settings.ignore_ssl_errors,
        }
    }
}

/// A media server that can be asked to rescan its library.
#[async_trait]
pub trait LibraryNotifier: Send + Sync {
    /// Target name as used in the settings maps (e.g. `Plex`).
    fn target(&self) -> &str;

    async fn refresh(
        &self,
        target: &NotificationTarget,
        context: &NotifyContext,
    ) -> Result<(), NotifyError>;
}

/// Result of notifying every configured target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

pub(crate) fn http_client(ignore_tls_errors: bool) -> Result<Client, NotifyError> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .danger_accept_invalid_certs(ignore_tls_errors)
        .build()
        .map_err(|e| NotifyError::Client(e.to_string()))
}

/// Call every notifier whose target is configured.
///
/// Targets are refreshed concurrently. Failures are logged per target and
/// never stop the others.
pub async fn notify_all(
    notifiers: &[Arc<dyn LibraryNotifier>],
    settings: &Settings,
) -> NotifyReport {
    let context = NotifyContext::from_settings(settings);

    let calls: Vec<_> = settings
        .notification_targets()
        .into_iter()
        .filter_map(|target| {
            let Some(notifier) = notifiers.iter().find(|n| n.target() == target.name) else {
                warn!(target = %target.name, "No notifier for configured target");
                return None;
            };
            let notifier = Arc::clone(notifier);
            let context = &context;
            Some(async move {
                info!(target = %target.name, library = %context.library_name, "Requesting library refresh");
                let result = notifier.refresh(&target, context).await;
                (target.name, result)
            })
        })
        .collect();

    let mut report = NotifyReport::default();
    for (name, result) in join_all(calls).await {
        match result {
            Ok(()) => {
                info!(target = %name, "Library refresh requested");
                metrics::NOTIFICATIONS_TOTAL
                    .with_label_values(&[name.as_str(), "success"])
                    .inc();
                report.succeeded.push(name);
            }
            Err(e) => {
                warn!(target = %name, error = %e, "Library refresh failed");
                metrics::NOTIFICATIONS_TOTAL
                    .with_label_values(&[name.as_str(), "failed"])
                    .inc();
                report.failed.push(name);
            }
        }
    }

    report
}

/// The notifiers shipped with the server.
pub fn default_notifiers() -> Vec<Arc<dyn LibraryNotifier>> {
    vec![Arc::new(PlexNotifier::new()), Arc::new(JellyfinNotifier::new())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockNotifier;

    fn settings(addresses: &str, tokens: &str) -> Settings {
        Settings {
            media_server_addresses: addresses.to_string(),
            media_server_tokens: tokens.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_notify_all_isolates_failures() {
        let plex = Arc::new(MockNotifier::new("Plex"));
        let jellyfin = Arc::new(MockNotifier::new("Jellyfin"));
        plex.set_fail(true).await;

        let notifiers: Vec<Arc<dyn LibraryNotifier>> = vec![plex.clone(), jellyfin.clone()];
        let report = notify_all(
            &notifiers,
            &settings("Plex:http://p,Jellyfin:http://j", "Plex:a,Jellyfin:b"),
        )
        .await;

        assert_eq!(report.failed, vec!["Plex".to_string()]);
        assert_eq!(report.succeeded, vec!["Jellyfin".to_string()]);
        assert_eq!(jellyfin.recorded_calls().await.len(), 1);
        assert_eq!(jellyfin.recorded_calls().await[0].token, "b");
    }

    #[tokio::test]
    async fn test_notify_all_skips_targets_without_token() {
        let plex = Arc::new(MockNotifier::new("Plex"));
        let notifiers: Vec<Arc<dyn LibraryNotifier>> = vec![plex.clone()];
        let report = notify_all(&notifiers, &settings("Plex:http://p", "")).await;

        assert_eq!(report, NotifyReport::default());
        assert!(plex.recorded_calls().await.is_empty());
    }
}
