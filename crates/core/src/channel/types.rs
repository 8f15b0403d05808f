//! Channel records and their sync state.

use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `DL_Days` value meaning "look back without limit".
pub const UNBOUNDED_LOOKBACK: i64 = -1;

/// `Keep_Days` value meaning "never expire".
pub const PERMANENT_RETENTION: i64 = -1;

/// Format of the `Last_Synced` timestamp.
pub const SYNCED_AT_FORMAT: &str = "%d-%m-%y %H:%M:%S";

/// Characters that may not appear in a channel name (it doubles as a folder name).
const FORBIDDEN_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Per-channel sync state, persisted as `Last_Synced`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SyncState {
    /// No sync attempted yet.
    #[default]
    Never,
    /// Admitted to the current run, waiting for a worker slot.
    Queued,
    /// A worker is processing the channel.
    InProgress,
    /// Last run completed; holds the formatted completion time.
    Synced(String),
    /// Last run hit an error.
    Failed,
    /// A previous run was interrupted before the channel reached a terminal state.
    Incomplete,
}

impl SyncState {
    /// Successful completion at the given local time.
    pub fn synced_at(at: DateTime<Local>) -> Self {
        Self::Synced(at.format(SYNCED_AT_FORMAT).to_string())
    }

    /// Whether the channel is part of a run that has not finished with it.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::InProgress)
    }

    /// State to present after loading from disk.
    ///
    /// Anything that was mid-run when the file was written becomes `Incomplete`.
    pub fn recovered(self) -> Self {
        match self {
            Self::Queued | Self::InProgress | Self::Failed => Self::Incomplete,
            other => other,
        }
    }
}

impl From<String> for SyncState {
    fn from(value: String) -> Self {
        match value.trim() {
            "" | "Never" => Self::Never,
            "Queued" => Self::Queued,
            "In Progress" => Self::InProgress,
            "Failed" => Self::Failed,
            "Incomplete" => Self::Incomplete,
            _ => Self::Synced(value),
        }
    }
}

impl From<SyncState> for String {
    fn from(state: SyncState) -> Self {
        match state {
            SyncState::Never => "Never".to_string(),
            SyncState::Queued => "Queued".to_string(),
            SyncState::InProgress => "In Progress".to_string(),
            SyncState::Synced(at) => at,
            SyncState::Failed => "Failed".to_string(),
            SyncState::Incomplete => "Incomplete".to_string(),
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from(self.clone()))
    }
}

/// How live streams are treated when building the fetch list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LiveRule {
    /// Skip anything that is or was a live stream.
    #[default]
    Ignore,
    /// Only take the single currently active live stream.
    Only,
    /// No live filtering.
    Include,
}

impl From<String> for LiveRule {
    fn from(value: String) -> Self {
        match value.trim() {
            "Ignore" => Self::Ignore,
            "Only" => Self::Only,
            _ => Self::Include,
        }
    }
}

impl From<LiveRule> for String {
    fn from(rule: LiveRule) -> Self {
        match rule {
            LiveRule::Ignore => "Ignore",
            LiveRule::Only => "Only",
            LiveRule::Include => "Include",
        }
        .to_string()
    }
}

/// A configured remote channel and its mutable sync state.
///
/// Field names follow the on-disk `channel_list.json` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(rename = "Id", default, deserialize_with = "lenient_u64")]
    pub id: u64,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Link", default)]
    pub link: String,
    #[serde(rename = "Paused", default, deserialize_with = "lenient_bool")]
    pub paused: bool,
    #[serde(rename = "DL_Days", default, deserialize_with = "lenient_i64")]
    pub dl_days: i64,
    #[serde(rename = "Keep_Days", default, deserialize_with = "lenient_i64")]
    pub keep_days: i64,
    #[serde(rename = "Last_Synced", default)]
    pub last_synced: SyncState,
    #[serde(rename = "Item_Count", default, deserialize_with = "lenient_u64")]
    pub item_count: u64,
    #[serde(rename = "Item_Size", default, deserialize_with = "lenient_u64")]
    pub item_size: u64,
    #[serde(rename = "Remote_Count", default, deserialize_with = "lenient_u64")]
    pub remote_count: u64,
    #[serde(rename = "Filter_Title_Text", default)]
    pub filter_title_text: String,
    #[serde(rename = "Negate_Filter", default, deserialize_with = "lenient_bool")]
    pub negate_filter: bool,
    #[serde(rename = "Search_Limit", default, deserialize_with = "lenient_u64")]
    pub search_limit: u64,
    #[serde(rename = "Live_Rule", default)]
    pub live_rule: LiveRule,
    #[serde(rename = "Audio_Only", default, deserialize_with = "lenient_bool")]
    pub audio_only: bool,
    #[serde(
        rename = "Use_SponsorBlock",
        default = "default_true",
        deserialize_with = "lenient_bool"
    )]
    pub use_sponsorblock: bool,
    #[serde(rename = "Use_Best_Quality", default, deserialize_with = "lenient_bool")]
    pub use_best_quality: bool,
    #[serde(
        rename = "Write_Info_Json",
        default = "default_true",
        deserialize_with = "lenient_bool"
    )]
    pub write_info_json: bool,
    #[serde(
        rename = "Set_Mtime",
        default = "default_true",
        deserialize_with = "lenient_bool"
    )]
    pub set_mtime: bool,
}

fn default_true() -> bool {
    true
}

impl Channel {
    /// A fresh channel with the defaults offered to users when they add one.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            name: "New Channel".to_string(),
            link: "https://www.youtube.com/@NewChannel".to_string(),
            paused: false,
            dl_days: 14,
            keep_days: 28,
            last_synced: SyncState::Never,
            item_count: 0,
            item_size: 0,
            remote_count: 0,
            filter_title_text: String::new(),
            negate_filter: false,
            search_limit: 0,
            live_rule: LiveRule::Ignore,
            audio_only: false,
            use_sponsorblock: true,
            use_best_quality: false,
            write_info_json: true,
            set_mtime: true,
        }
    }

    /// Whether `Keep_Days` disables cleanup.
    pub fn keeps_forever(&self) -> bool {
        self.keep_days == PERMANENT_RETENTION
    }

    /// Lookback window in days, `None` when unbounded.
    pub fn lookback_days(&self) -> Option<i64> {
        (self.dl_days != UNBOUNDED_LOOKBACK).then_some(self.dl_days)
    }

    /// Apply the user-editable fields of an update.
    pub fn apply(&mut self, update: &ChannelUpdate) {
        if let Some(ref name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(ref link) = update.link {
            self.link = link.trim().to_string();
        }
        if let Some(paused) = update.paused {
            self.paused = paused;
        }
        if let Some(dl_days) = update.dl_days {
            self.dl_days = dl_days;
        }
        if let Some(keep_days) = update.keep_days {
            self.keep_days = keep_days;
        }
        if let Some(ref text) = update.filter_title_text {
            self.filter_title_text = text.clone();
        }
        if let Some(negate) = update.negate_filter {
            self.negate_filter = negate;
        }
        if let Some(limit) = update.search_limit {
            self.search_limit = limit;
        }
        if let Some(rule) = update.live_rule {
            self.live_rule = rule;
        }
        if let Some(audio_only) = update.audio_only {
            self.audio_only = audio_only;
        }
        if let Some(v) = update.use_sponsorblock {
            self.use_sponsorblock = v;
        }
        if let Some(v) = update.use_best_quality {
            self.use_best_quality = v;
        }
        if let Some(v) = update.write_info_json {
            self.write_info_json = v;
        }
        if let Some(v) = update.set_mtime {
            self.set_mtime = v;
        }
    }
}

/// Editable subset of a channel, as sent by clients.
///
/// Derived state (`Last_Synced`, `Item_Count`, `Item_Size`, `Remote_Count`)
/// is not part of it and is ignored if present in the payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelUpdate {
    #[serde(rename = "Id", deserialize_with = "lenient_u64")]
    pub id: u64,
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Link", default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(
        rename = "Paused",
        default,
        deserialize_with = "lenient_opt_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub paused: Option<bool>,
    #[serde(
        rename = "DL_Days",
        default,
        deserialize_with = "lenient_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub dl_days: Option<i64>,
    #[serde(
        rename = "Keep_Days",
        default,
        deserialize_with = "lenient_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub keep_days: Option<i64>,
    #[serde(
        rename = "Filter_Title_Text",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub filter_title_text: Option<String>,
    #[serde(
        rename = "Negate_Filter",
        default,
        deserialize_with = "lenient_opt_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub negate_filter: Option<bool>,
    #[serde(
        rename = "Search_Limit",
        default,
        deserialize_with = "lenient_opt_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub search_limit: Option<u64>,
    #[serde(rename = "Live_Rule", default, skip_serializing_if = "Option::is_none")]
    pub live_rule: Option<LiveRule>,
    #[serde(
        rename = "Audio_Only",
        default,
        deserialize_with = "lenient_opt_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub audio_only: Option<bool>,
    #[serde(
        rename = "Use_SponsorBlock",
        default,
        deserialize_with = "lenient_opt_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub use_sponsorblock: Option<bool>,
    #[serde(
        rename = "Use_Best_Quality",
        default,
        deserialize_with = "lenient_opt_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub use_best_quality: Option<bool>,
    #[serde(
        rename = "Write_Info_Json",
        default,
        deserialize_with = "lenient_opt_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub write_info_json: Option<bool>,
    #[serde(
        rename = "Set_Mtime",
        default,
        deserialize_with = "lenient_opt_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub set_mtime: Option<bool>,
}

impl ChannelUpdate {
    /// Update that only toggles the paused flag.
    pub fn pause(id: u64, paused: bool) -> Self {
        Self {
            id,
            paused: Some(paused),
            ..Default::default()
        }
    }
}

/// Check that a name can be used as a single folder component.
pub fn validate_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("channel name cannot be empty".to_string());
    }
    if trimmed == "." || trimmed == ".." {
        return Err(format!("'{}' is not a valid channel name", trimmed));
    }
    if let Some(c) = trimmed.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        return Err(format!("channel name cannot contain '{}'", c));
    }
    Ok(())
}

// ============================================================================
// Lenient field parsing
//
// Older channel files and UI payloads carry numbers as strings ("" included)
// and booleans as 0/1.
// ============================================================================

fn value_to_i64(value: &Value) -> Result<Option<i64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| format!("invalid number: {}", n)),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| format!("invalid number: '{}'", s)),
        Value::Bool(b) => Ok(Some(i64::from(*b))),
        other => Err(format!("expected a number, got {}", other)),
    }
}

fn value_to_bool(value: &Value) -> Result<Option<bool>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        Value::Number(n) => Ok(Some(n.as_f64().unwrap_or(0.0) != 0.0)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "" => Ok(None),
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(format!("invalid boolean: '{}'", s)),
        },
        other => Err(format!("expected a boolean, got {}", other)),
    }
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(d)?;
    value_to_i64(&value).map_err(serde::de::Error::custom)
}

fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(lenient_opt_i64(d)?.unwrap_or(0))
}

fn lenient_opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    match lenient_opt_i64(d)? {
        Some(n) if n < 0 => Err(serde::de::Error::custom(format!(
            "expected a non-negative number, got {}",
            n
        ))),
        other => Ok(other.map(|n| n as u64)),
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    Ok(lenient_opt_u64(d)?.unwrap_or(0))
}

fn lenient_opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    let value = Value::deserialize(d)?;
    value_to_bool(&value).map_err(serde::de::Error::custom)
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(lenient_opt_bool(d)?.unwrap_or(false))
}
