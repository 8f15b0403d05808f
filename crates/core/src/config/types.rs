use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub ytdlp: YtDlpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory with the static web UI.
    #[serde(default = "default_dashboard_dir")]
    pub dashboard_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dashboard_dir: default_dashboard_dir(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    5000
}

fn default_dashboard_dir() -> PathBuf {
    PathBuf::from("static")
}

/// Filesystem locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    /// Holds `channel_list.json`, `settings_config.json` and an optional `cookies.txt`.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    /// Library root for video channels.
    #[serde(default = "default_video_dir")]
    pub video_dir: PathBuf,
    /// Library root for audio-only channels.
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            video_dir: default_video_dir(),
            audio_dir: default_audio_dir(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("config")
}

fn default_video_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("audio_downloads")
}

/// Sync engine tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Number of channels processed in parallel.
    #[serde(default = "default_thread_limit")]
    pub thread_limit: usize,

    /// Items younger than this many hours are left for a later run.
    #[serde(default)]
    pub defer_hours: f64,

    /// Append ` [id]` to fetched item titles.
    #[serde(default = "default_true")]
    pub include_id_in_filename: bool,

    /// How often the trigger checks the configured sync hours (seconds).
    #[serde(default = "default_check_interval")]
    pub schedule_check_interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            thread_limit: default_thread_limit(),
            defer_hours: 0.0,
            include_id_in_filename: true,
            schedule_check_interval_secs: default_check_interval(),
        }
    }
}

fn default_thread_limit() -> usize {
    1
}

fn default_check_interval() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

/// Subtitle handling for fetched items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum SubtitleMode {
    #[default]
    None,
    Embed,
    External,
}

impl From<String> for SubtitleMode {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "embed" => Self::Embed,
            "external" => Self::External,
            _ => Self::None,
        }
    }
}

impl From<SubtitleMode> for String {
    fn from(mode: SubtitleMode) -> Self {
        match mode {
            SubtitleMode::None => "none",
            SubtitleMode::Embed => "embed",
            SubtitleMode::External => "external",
        }
        .to_string()
    }
}

/// Encoding and subtitle preferences.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    #[serde(default)]
    pub subtitles: SubtitleMode,
    #[serde(default = "default_subtitle_languages")]
    pub subtitle_languages: Vec<String>,
    #[serde(default = "default_video_format_id")]
    pub video_format_id: String,
    #[serde(default = "default_audio_format_id")]
    pub audio_format_id: String,
    #[serde(default = "default_fallback_vcodec")]
    pub fallback_vcodec: String,
    #[serde(default = "default_fallback_acodec")]
    pub fallback_acodec: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            subtitles: SubtitleMode::None,
            subtitle_languages: default_subtitle_languages(),
            video_format_id: default_video_format_id(),
            audio_format_id: default_audio_format_id(),
            fallback_vcodec: default_fallback_vcodec(),
            fallback_acodec: default_fallback_acodec(),
        }
    }
}

fn default_subtitle_languages() -> Vec<String> {
    vec!["en".to_string()]
}

fn default_video_format_id() -> String {
    "137".to_string()
}

fn default_audio_format_id() -> String {
    "140".to_string()
}

fn default_fallback_vcodec() -> String {
    "vp9".to_string()
}

fn default_fallback_acodec() -> String {
    "mp4a".to_string()
}

/// yt-dlp invocation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct YtDlpConfig {
    #[serde(default = "default_ytdlp_binary")]
    pub binary: PathBuf,
    #[serde(default = "default_ffmpeg_location")]
    pub ffmpeg_location: PathBuf,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retries")]
    pub fragment_retries: u32,
    /// Listed entries with a known duration below this are dropped.
    #[serde(default = "default_min_duration")]
    pub min_duration_secs: u64,
    /// Write id/title/date tags onto fetched files.
    #[serde(default = "default_true")]
    pub stamp_tags: bool,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: default_ytdlp_binary(),
            ffmpeg_location: default_ffmpeg_location(),
            retries: default_retries(),
            fragment_retries: default_retries(),
            min_duration_secs: default_min_duration(),
            stamp_tags: true,
            verbose: false,
        }
    }
}

fn default_ytdlp_binary() -> PathBuf {
    PathBuf::from("yt-dlp")
}

fn default_ffmpeg_location() -> PathBuf {
    PathBuf::from("/usr/bin/ffmpeg")
}

fn default_retries() -> u32 {
    10
}

fn default_min_duration() -> u64 {
    90
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Use `debug` as the default filter when `RUST_LOG` is unset.
    #[serde(default)]
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn default_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info,tower_http=debug"
        }
    }
}

/// Sanitized config for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub sync: SyncConfig,
    pub media: MediaConfig,
    pub ytdlp_binary: PathBuf,
    pub stamp_tags: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            paths: config.paths.clone(),
            sync: config.sync.clone(),
            media: config.media.clone(),
            ytdlp_binary: config.ytdlp.binary.clone(),
            stamp_tags: config.ytdlp.stamp_tags,
        }
    }
}
