//! Runtime settings persisted next to the channel list.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::registry::write_json_atomic;
use super::RegistryError;

/// Settings edited from the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Local hours (0-23) at which a scheduled run starts.
    #[serde(default)]
    pub sync_start_times: Vec<u8>,
    /// `Target:address` pairs joined by commas.
    #[serde(default)]
    pub media_server_addresses: String,
    /// `Target:token` pairs joined by commas.
    #[serde(default)]
    pub media_server_tokens: String,
    #[serde(default = "default_library_name")]
    pub media_server_library_name: String,
    #[serde(default)]
    pub ignore_ssl_errors: bool,
    #[serde(default)]
    pub youtube_slow: bool,
}

fn default_library_name() -> String {
    "YouTube".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sync_start_times: Vec::new(),
            media_server_addresses: String::new(),
            media_server_tokens: String::new(),
            media_server_library_name: default_library_name(),
            ignore_ssl_errors: false,
            youtube_slow: false,
        }
    }
}

/// A notification target with both an address and a token configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationTarget {
    pub name: String,
    pub address: String,
    pub token: String,
}

impl Settings {
    /// Whether a scheduled run should start at this hour.
    pub fn is_sync_hour(&self, hour: u32) -> bool {
        self.sync_start_times.iter().any(|h| u32::from(*h) == hour)
    }

    /// Targets present in both the address and the token maps.
    pub fn notification_targets(&self) -> Vec<NotificationTarget> {
        let addresses = parse_target_map(&self.media_server_addresses);
        let tokens = parse_target_map(&self.media_server_tokens);

        addresses
            .into_iter()
            .filter_map(|(name, address)| {
                let token = tokens.get(&name)?;
                if address.is_empty() || token.is_empty() {
                    return None;
                }
                Some(NotificationTarget {
                    token: token.clone(),
                    name,
                    address,
                })
            })
            .collect()
    }
}

/// Hours as sent by clients: either the raw comma-separated text or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SyncHoursInput {
    Text(String),
    List(Vec<i64>),
}

impl Default for SyncHoursInput {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// A settings save request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsUpdate {
    #[serde(default)]
    pub sync_start_times: SyncHoursInput,
    #[serde(default)]
    pub media_server_addresses: String,
    #[serde(default)]
    pub media_server_tokens: String,
    #[serde(default = "default_library_name")]
    pub media_server_library_name: String,
    #[serde(default)]
    pub ignore_ssl_errors: bool,
    #[serde(default)]
    pub youtube_slow: bool,
}

fn clamp_hour(hour: i64) -> u8 {
    if (0..=23).contains(&hour) {
        hour as u8
    } else {
        0
    }
}

fn normalize_hours(hours: impl IntoIterator<Item = i64>) -> Vec<u8> {
    let mut hours: Vec<u8> = hours.into_iter().map(clamp_hour).collect();
    hours.sort_unstable();
    hours.dedup();
    hours
}

/// Parse a comma-separated hour list.
///
/// Non-digits are stripped from each entry, out-of-range hours become 0,
/// and the result is deduplicated and sorted. Any unparsable entry clears
/// the whole list.
pub fn parse_sync_hours(input: &str) -> Vec<u8> {
    if input.trim().is_empty() {
        return Vec::new();
    }

    let parsed: Result<Vec<i64>, _> = input
        .split(',')
        .map(|entry| {
            entry
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse::<i64>()
        })
        .collect();

    match parsed {
        Ok(hours) => normalize_hours(hours),
        Err(e) => {
            warn!(input = %input, error = %e, "Unparsable sync hours, clearing schedule");
            Vec::new()
        }
    }
}

/// Parse `Target:value` pairs joined by commas.
///
/// Each pair splits on its first colon so values may contain colons
/// (e.g. URLs). Pairs without a colon are ignored.
pub fn parse_target_map(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| pair.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

/// Owns the persisted settings file.
pub struct SettingsStore {
    path: PathBuf,
    settings: RwLock<Settings>,
}

impl SettingsStore {
    /// Load settings; a missing or malformed file yields defaults.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<Settings>(&raw) {
                Ok(settings) => {
                    info!(path = %path.display(), "Settings loaded");
                    settings
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Malformed settings file, using defaults");
                    Settings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read settings, using defaults");
                Settings::default()
            }
        };

        Self {
            path,
            settings: RwLock::new(settings),
        }
    }

    /// In-memory store, used in tests.
    pub fn with_settings(path: impl Into<PathBuf>, settings: Settings) -> Self {
        Self {
            path: path.into(),
            settings: RwLock::new(settings),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Apply a save request and persist.
    pub async fn apply(&self, update: SettingsUpdate) -> Result<Settings, RegistryError> {
        let hours = match &update.sync_start_times {
            SyncHoursInput::Text(text) => parse_sync_hours(text),
            SyncHoursInput::List(list) => normalize_hours(list.iter().copied()),
        };

        let snapshot = {
            let mut settings = self.settings.write().await;
            *settings = Settings {
                sync_start_times: hours,
                media_server_addresses: update.media_server_addresses,
                media_server_tokens: update.media_server_tokens,
                media_server_library_name: update.media_server_library_name,
                ignore_ssl_errors: update.ignore_ssl_errors,
                youtube_slow: update.youtube_slow,
            };
            settings.clone()
        };

        info!(hours = ?snapshot.sync_start_times, "Settings updated");
        write_json_atomic(&self.path, &snapshot).await?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_sync_hours() {
        assert_eq!(parse_sync_hours(""), Vec::<u8>::new());
        assert_eq!(parse_sync_hours("6, 18"), vec![6, 18]);
        assert_eq!(parse_sync_hours("18,6,6"), vec![6, 18]);
        assert_eq!(parse_sync_hours("7h, 25"), vec![0, 7]);
        assert_eq!(parse_sync_hours("-3"), vec![3]);
        // An entry with no digits clears everything
        assert_eq!(parse_sync_hours("6, abc"), Vec::<u8>::new());
    }

    #[test]
    fn test_parse_target_map() {
        let map = parse_target_map("Plex: http://plex:32400, Jellyfin:http://jf:8096,junk");
        assert_eq!(map.get("Plex").map(String::as_str), Some("http://plex:32400"));
        assert_eq!(map.get("Jellyfin").map(String::as_str), Some("http://jf:8096"));
        assert_eq!(map.len(), 2);
        assert!(parse_target_map("").is_empty());
    }

    #[test]
    fn test_notification_targets_need_address_and_token() {
        let settings = Settings {
            media_server_addresses: "Plex:http://plex:32400,Jellyfin:http://jf:8096".to_string(),
            media_server_tokens: "Plex:abc".to_string(),
            ..Default::default()
        };
        let targets = settings.notification_targets();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].name, "Plex");
        assert_eq!(targets[0].token, "abc");
    }

    #[tokio::test]
    async fn test_load_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::load(dir.path().join("settings_config.json")).await;
        let settings = store.get().await;
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.media_server_library_name, "YouTube");
    }

    #[tokio::test]
    async fn test_load_malformed_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings_config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::load(&path).await;
        assert_eq!(store.get().await, Settings::default());
    }

    #[tokio::test]
    async fn test_apply_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings_config.json");
        let store = SettingsStore::load(&path).await;

        let saved = store
            .apply(SettingsUpdate {
                sync_start_times: SyncHoursInput::Text("22, 3".to_string()),
                media_server_addresses: "Jellyfin:http://jf:8096".to_string(),
                media_server_tokens: "Jellyfin:tok".to_string(),
                media_server_library_name: "Tube".to_string(),
                ignore_ssl_errors: true,
                youtube_slow: false,
            })
            .await
            .unwrap();
        assert_eq!(saved.sync_start_times, vec![3, 22]);

        let reloaded = SettingsStore::load(&path).await.get().await;
        assert_eq!(reloaded, saved);
        assert!(reloaded.is_sync_hour(22));
        assert!(!reloaded.is_sync_hour(4));
    }

    #[test]
    fn test_update_accepts_hour_list() {
        let update: SettingsUpdate =
            serde_json::from_str(r#"{"sync_start_times": [5, 30, 5]}"#).unwrap();
        assert_eq!(update.sync_start_times, SyncHoursInput::List(vec![5, 30, 5]));
        assert_eq!(update.media_server_library_name, "YouTube");
    }
}
