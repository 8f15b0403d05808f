//! Plex library section refresh.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::debug;

use super::{http_client, LibraryNotifier, NotifyContext, NotifyError};
use crate::channel::NotificationTarget;

#[derive(Debug, Deserialize)]
struct SectionsResponse {
    #[serde(rename = "MediaContainer")]
    media_container: MediaContainer,
}

#[derive(Debug, Deserialize)]
struct MediaContainer {
    #[serde(rename = "Directory", default)]
    directory: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct Section {
    key: String,
    title: String,
}

/// Find the key of the section titled `name`.
fn find_section_key(json: &str, name: &str) -> Result<String, NotifyError> {
    let response: SectionsResponse =
        serde_json::from_str(json).map_err(|e| NotifyError::Parse(e.to_string()))?;
    response
        .media_container
        .directory
        .into_iter()
        .find(|s| s.title == name)
        .map(|s| s.key)
        .ok_or_else(|| NotifyError::SectionNotFound(name.to_string()))
}

#[derive(Debug, Default, Clone)]
pub struct PlexNotifier;

impl PlexNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LibraryNotifier for PlexNotifier {
    fn target(&self) -> &str {
        "Plex"
    }

    async fn refresh(
        &self,
        target: &NotificationTarget,
        context: &NotifyContext,
    ) -> Result<(), NotifyError> {
        let client = http_client(context.ignore_tls_errors)?;
        let base = target.address.trim_end_matches('/');
        let token = urlencoding::encode(&target.token);

        let sections_url = format!("{}/library/sections?X-Plex-Token={}", base, token);
        let response = client
            .get(&sections_url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;
        if !status.is_success() {
            return Err(NotifyError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        let key = find_section_key(&body, &context.library_name)?;
        debug!(section = %key, library = %context.library_name, "Refreshing Plex section");

        let refresh_url = format!(
            "{}/library/sections/{}/refresh?X-Plex-Token={}",
            base,
            urlencoding::encode(&key),
            token
        );
        let response = client
            .get(&refresh_url)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTIONS: &str = r#"{
        "MediaContainer": {
            "size": 2,
            "Directory": [
                {"key": "1", "title": "Movies", "type": "movie"},
                {"key": "7", "title": "YouTube", "type": "show"}
            ]
        }
    }"#;

    #[test]
    fn test_find_section_key() {
        assert_eq!(find_section_key(SECTIONS, "YouTube").unwrap(), "7");
        assert!(matches!(
            find_section_key(SECTIONS, "Music"),
            Err(NotifyError::SectionNotFound(_))
        ));
        assert!(matches!(
            find_section_key("<xml/>", "YouTube"),
            Err(NotifyError::Parse(_))
        ));
    }
}
