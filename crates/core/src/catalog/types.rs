//! Types for remote channel listings.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Live state of a remote item as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LiveStatus {
    IsLive,
    PostLive,
    IsUpcoming,
    WasLive,
    NotLive,
    Other(String),
}

impl LiveStatus {
    /// A stream that is running now or just ended and is still being finalized.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::IsLive | Self::PostLive)
    }
}

impl From<String> for LiveStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "is_live" => Self::IsLive,
            "post_live" => Self::PostLive,
            "is_upcoming" => Self::IsUpcoming,
            "was_live" => Self::WasLive,
            "not_live" => Self::NotLive,
            _ => Self::Other(value),
        }
    }
}

impl From<LiveStatus> for String {
    fn from(status: LiveStatus) -> Self {
        match status {
            LiveStatus::IsLive => "is_live".to_string(),
            LiveStatus::PostLive => "post_live".to_string(),
            LiveStatus::IsUpcoming => "is_upcoming".to_string(),
            LiveStatus::WasLive => "was_live".to_string(),
            LiveStatus::NotLive => "not_live".to_string(),
            LiveStatus::Other(s) => s,
        }
    }
}

/// One item from a channel listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub id: String,
    pub title: String,
    pub url: String,
    /// Duration in seconds, when known.
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub live_status: Option<LiveStatus>,
}

/// A channel's listing, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelListing {
    pub title: Option<String>,
    pub channel_id: Option<String>,
    pub entries: Vec<RemoteEntry>,
}

/// Per-item details fetched on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub upload_date: NaiveDate,
    /// Upload time as a unix timestamp.
    pub timestamp: i64,
}

/// Request pacing and transport options shared by listing and fetching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchTuning {
    /// Sleep between requests and items.
    pub slow: bool,
    /// Skip TLS certificate verification.
    pub ignore_tls_errors: bool,
    /// Netscape cookie file passed to the backend.
    pub cookies: Option<PathBuf>,
}

impl FetchTuning {
    /// Command-line flags for yt-dlp.
    pub fn ytdlp_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.slow {
            args.extend(
                [
                    "--sleep-requests",
                    "0.75",
                    "--sleep-interval",
                    "10",
                    "--max-sleep-interval",
                    "20",
                    "--sleep-subtitles",
                    "5",
                ]
                .map(String::from),
            );
        }
        if self.ignore_tls_errors {
            args.push("--no-check-certificates".to_string());
        }
        if let Some(ref cookies) = self.cookies {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().to_string());
        }
        args
    }
}

/// Errors from the remote catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog backend not found at path: {0}")]
    BackendNotFound(String),

    #[error("Catalog command failed: {0}")]
    CommandFailed(String),

    #[error("Failed to parse catalog output: {0}")]
    Parse(String),

    #[error("Missing field in catalog output: {0}")]
    MissingField(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
