//! yt-dlp backed remote catalog.

use std::process::Stdio;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use super::types::{CatalogError, ChannelListing, FetchTuning, ItemDetails, RemoteEntry};
use super::RemoteCatalog;
use crate::channel::LiveRule;
use crate::config::YtDlpConfig;

#[derive(Debug, Deserialize)]
struct RawListing {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    channel_id: Option<String>,
    #[serde(default)]
    entries: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    live_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDetails {
    #[serde(default)]
    upload_date: Option<String>,
    #[serde(default)]
    timestamp: Option<f64>,
}

/// Parse a flat-playlist JSON dump, dropping entries shorter than `min_duration`.
///
/// Entries without an id are skipped; unknown durations are kept.
fn parse_listing(json: &str, min_duration: u64) -> Result<ChannelListing, CatalogError> {
    let raw: RawListing =
        serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;

    let entries = raw
        .entries
        .into_iter()
        .filter_map(|e| {
            let id = e.id?;
            if let Some(duration) = e.duration {
                if duration < min_duration as f64 {
                    debug!(item = %id, duration, "Dropping short item");
                    return None;
                }
            }
            let url = e
                .url
                .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", id));
            Some(RemoteEntry {
                title: e.title.unwrap_or_else(|| id.clone()),
                url,
                duration: e.duration,
                live_status: e.live_status.map(Into::into),
                id,
            })
        })
        .collect();

    Ok(ChannelListing {
        title: raw.title.filter(|t| !t.is_empty()),
        channel_id: raw.channel_id.filter(|c| !c.is_empty()),
        entries,
    })
}

fn parse_details(json: &str) -> Result<ItemDetails, CatalogError> {
    let raw: RawDetails =
        serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;

    let upload_date = raw
        .upload_date
        .ok_or(CatalogError::MissingField("upload_date"))?;
    let upload_date = NaiveDate::parse_from_str(&upload_date, "%Y%m%d")
        .map_err(|e| CatalogError::Parse(format!("upload_date '{}': {}", upload_date, e)))?;
    let timestamp = raw.timestamp.ok_or(CatalogError::MissingField("timestamp"))? as i64;

    Ok(ItemDetails {
        upload_date,
        timestamp,
    })
}

/// Where the items of a non-playlist link actually live.
///
/// Playlist links are used as-is (`None`). Channel links need an id and a
/// title; their uploads live in the `UU` playlist, or under `/streams` for
/// live-only channels.
fn items_playlist(
    link: &str,
    listing: &ChannelListing,
    live_rule: LiveRule,
) -> Result<Option<String>, CatalogError> {
    if link.to_lowercase().contains("playlist?list") {
        return Ok(None);
    }

    let channel_id = listing
        .channel_id
        .as_deref()
        .ok_or(CatalogError::MissingField("channel_id"))?;
    if listing.title.is_none() {
        return Err(CatalogError::MissingField("title"));
    }

    if live_rule == LiveRule::Only {
        return Ok(Some(format!("{}/streams", link.trim_end_matches('/'))));
    }

    let suffix = channel_id.get(2..).unwrap_or_default();
    Ok(Some(format!(
        "https://www.youtube.com/playlist?list=UU{}",
        suffix
    )))
}

/// Remote catalog backed by the yt-dlp binary.
pub struct YtDlpCatalog {
    config: YtDlpConfig,
}

impl YtDlpCatalog {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    async fn dump_json(&self, args: Vec<String>) -> Result<String, CatalogError> {
        debug!(args = ?args, "Running yt-dlp");

        let output = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CatalogError::BackendNotFound(self.config.binary.display().to_string())
                } else {
                    CatalogError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let last = stderr.lines().last().unwrap_or("no output").trim().to_string();
            return Err(CatalogError::CommandFailed(format!(
                "exit code {:?}: {}",
                output.status.code(),
                last
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn listing_args(&self, url: &str, search_limit: u64, tuning: &FetchTuning) -> Vec<String> {
        let mut args = vec![
            "--flat-playlist".to_string(),
            "--dump-single-json".to_string(),
            "--no-warnings".to_string(),
            "--retries".to_string(),
            self.config.retries.to_string(),
        ];
        if search_limit > 0 {
            args.push("--playlist-items".to_string());
            args.push(format!("1-{}", search_limit));
        }
        if self.config.verbose {
            args.push("--verbose".to_string());
        }
        args.extend(tuning.ytdlp_args());
        args.push(url.to_string());
        args
    }

    async fn list_url(
        &self,
        url: &str,
        search_limit: u64,
        tuning: &FetchTuning,
    ) -> Result<ChannelListing, CatalogError> {
        let json = self
            .dump_json(self.listing_args(url, search_limit, tuning))
            .await?;
        parse_listing(&json, self.config.min_duration_secs)
    }
}

#[async_trait]
impl RemoteCatalog for YtDlpCatalog {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn list_channel(
        &self,
        link: &str,
        search_limit: u64,
        live_rule: LiveRule,
        tuning: &FetchTuning,
    ) -> Result<ChannelListing, CatalogError> {
        let listing = self.list_url(link, search_limit, tuning).await?;
        info!(
            link = %link,
            channel_id = ?listing.channel_id,
            title = ?listing.title,
            entries = listing.entries.len(),
            "Channel resolved"
        );

        match items_playlist(link, &listing, live_rule)? {
            None => Ok(listing),
            Some(playlist) => {
                debug!(playlist = %playlist, "Listing channel items");
                let items = self.list_url(&playlist, search_limit, tuning).await?;
                Ok(ChannelListing {
                    title: listing.title,
                    channel_id: listing.channel_id,
                    entries: items.entries,
                })
            }
        }
    }

    async fn item_details(
        &self,
        url: &str,
        tuning: &FetchTuning,
    ) -> Result<ItemDetails, CatalogError> {
        let mut args = vec![
            "--dump-single-json".to_string(),
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(tuning.ytdlp_args());
        args.push(url.to_string());

        let json = self.dump_json(args).await?;
        parse_details(&json)
    }
}
