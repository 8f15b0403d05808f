//! Jellyfin library refresh.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use super::{http_client, LibraryNotifier, NotifyContext, NotifyError};
use crate::channel::NotificationTarget;

#[derive(Debug, Default, Clone)]
pub struct JellyfinNotifier;

impl JellyfinNotifier {
    pub fn new() -> Self {
        Self
    }

    fn refresh_url(target: &NotificationTarget) -> String {
        format!(
            "{}/Library/Refresh?api_key={}",
            target.address.trim_end_matches('/'),
            urlencoding::encode(&target.token)
        )
    }
}

#[async_trait]
impl LibraryNotifier for JellyfinNotifier {
    fn target(&self) -> &str {
        "Jellyfin"
    }

    async fn refresh(
        &self,
        target: &NotificationTarget,
        context: &NotifyContext,
    ) -> Result<(), NotifyError> {
        let client = http_client(context.ignore_tls_errors)?;
        let url = Self::refresh_url(target);
        debug!(address = %target.address, "POST Jellyfin library refresh");

        let response = client
            .post(&url)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_url() {
        let target = NotificationTarget {
            name: "Jellyfin".to_string(),
            address: "http://jf:8096/".to_string(),
            token: "a b".to_string(),
        };
        assert_eq!(
            JellyfinNotifier::refresh_url(&target),
            "http://jf:8096/Library/Refresh?api_key=a%20b"
        );
    }
}
