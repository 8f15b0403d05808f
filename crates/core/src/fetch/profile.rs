//! Fetch profiles: format selection and post-processing per channel.

use serde::Serialize;

use crate::channel::Channel;
use crate::config::{MediaConfig, SubtitleMode};

/// Audio extraction step for audio-only channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioExtraction {
    /// Target codec; `None` keeps the best source codec.
    pub codec: Option<String>,
    pub quality: u8,
}

/// How one item is fetched and post-processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchProfile {
    pub format: String,
    pub merge_output_format: Option<String>,
    pub extract_audio: Option<AudioExtraction>,
    pub remove_sponsor_segments: bool,
    pub subtitles: SubtitleMode,
    pub subtitle_languages: Vec<String>,
    pub write_info_json: bool,
    /// Leave the file mtime at download time instead of the upload time.
    pub mtime_is_download_time: bool,
}

impl FetchProfile {
    /// Build the profile for a channel's toggles and the global media settings.
    pub fn for_channel(channel: &Channel, media: &MediaConfig) -> Self {
        let (format, merge_output_format, extract_audio) =
            match (channel.audio_only, channel.use_best_quality) {
                (true, true) => (
                    "bestaudio/best".to_string(),
                    None,
                    Some(AudioExtraction {
                        codec: None,
                        quality: 0,
                    }),
                ),
                (true, false) => (
                    format!(
                        "{}/bestaudio[acodec^={}]/bestaudio",
                        media.audio_format_id, media.fallback_acodec
                    ),
                    None,
                    Some(AudioExtraction {
                        codec: Some("m4a".to_string()),
                        quality: 0,
                    }),
                ),
                (false, true) => ("bestvideo*+bestaudio/best".to_string(), None, None),
                (false, false) => (
                    format!(
                        "{}+{}/bestvideo[vcodec^={}]+bestaudio[acodec^={}]/bestvideo+bestaudio/best",
                        media.video_format_id,
                        media.audio_format_id,
                        media.fallback_vcodec,
                        media.fallback_acodec
                    ),
                    Some("mp4".to_string()),
                    None,
                ),
            };

        Self {
            format,
            merge_output_format,
            extract_audio,
            remove_sponsor_segments: channel.use_sponsorblock,
            subtitles: media.subtitles,
            subtitle_languages: media.subtitle_languages.clone(),
            write_info_json: channel.write_info_json,
            mtime_is_download_time: channel.set_mtime,
        }
    }

    /// yt-dlp flags for this profile.
    pub fn ytdlp_args(&self) -> Vec<String> {
        let mut args = vec!["--format".to_string(), self.format.clone()];

        if let Some(ref merge) = self.merge_output_format {
            args.push("--merge-output-format".to_string());
            args.push(merge.clone());
        }

        if let Some(ref extract) = self.extract_audio {
            args.push("--extract-audio".to_string());
            if let Some(ref codec) = extract.codec {
                args.push("--audio-format".to_string());
                args.push(codec.clone());
            }
            args.push("--audio-quality".to_string());
            args.push(extract.quality.to_string());
        }

        if self.remove_sponsor_segments {
            args.push("--sponsorblock-remove".to_string());
            args.push("sponsor".to_string());
        }

        args.extend(
            [
                "--embed-metadata",
                "--embed-thumbnail",
                "--live-from-start",
                "--extractor-args",
                "youtubetab:skip=authcheck",
            ]
            .map(String::from),
        );

        if self.subtitles != SubtitleMode::None {
            args.extend(
                ["--write-subs", "--write-auto-subs", "--sub-format", "best", "--sub-langs"]
                    .map(String::from),
            );
            args.push(self.subtitle_languages.join(","));
            match self.subtitles {
                SubtitleMode::Embed => args.push("--embed-subs".to_string()),
                SubtitleMode::External => {
                    args.push("--convert-subs".to_string());
                    args.push("srt".to_string());
                }
                SubtitleMode::None => {}
            }
        }

        if self.write_info_json {
            args.push("--write-info-json".to_string());
        }
        if self.mtime_is_download_time {
            args.push("--no-mtime".to_string());
        }

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(audio_only: bool, best: bool) -> Channel {
        let mut c = Channel::new(0);
        c.audio_only = audio_only;
        c.use_best_quality = best;
        c
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_default_video_profile() {
        let profile = FetchProfile::for_channel(&channel(false, false), &MediaConfig::default());
        assert_eq!(
            profile.format,
            "137+140/bestvideo[vcodec^=vp9]+bestaudio[acodec^=mp4a]/bestvideo+bestaudio/best"
        );
        assert_eq!(profile.merge_output_format.as_deref(), Some("mp4"));
        assert!(profile.extract_audio.is_none());

        let args = profile.ytdlp_args();
        assert!(has_pair(&args, "--merge-output-format", "mp4"));
        assert!(has_pair(&args, "--sponsorblock-remove", "sponsor"));
        assert!(args.contains(&"--embed-thumbnail".to_string()));
        assert!(args.contains(&"--no-mtime".to_string()));
        assert!(!args.contains(&"--write-subs".to_string()));
    }

    #[test]
    fn test_best_quality_video_profile() {
        let profile = FetchProfile::for_channel(&channel(false, true), &MediaConfig::default());
        assert_eq!(profile.format, "bestvideo*+bestaudio/best");
        assert!(profile.merge_output_format.is_none());
    }

    #[test]
    fn test_audio_profiles() {
        let media = MediaConfig::default();

        let profile = FetchProfile::for_channel(&channel(true, false), &media);
        assert_eq!(profile.format, "140/bestaudio[acodec^=mp4a]/bestaudio");
        let args = profile.ytdlp_args();
        assert!(has_pair(&args, "--audio-format", "m4a"));
        assert!(has_pair(&args, "--audio-quality", "0"));

        let profile = FetchProfile::for_channel(&channel(true, true), &media);
        assert_eq!(profile.format, "bestaudio/best");
        let args = profile.ytdlp_args();
        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(!args.contains(&"--audio-format".to_string()));
    }

    #[test]
    fn test_subtitle_modes() {
        let mut media = MediaConfig {
            subtitles: SubtitleMode::External,
            subtitle_languages: vec!["en".to_string(), "de".to_string()],
            ..Default::default()
        };
        let args = FetchProfile::for_channel(&channel(false, false), &media).ytdlp_args();
        assert!(has_pair(&args, "--sub-langs", "en,de"));
        assert!(has_pair(&args, "--convert-subs", "srt"));
        assert!(args.contains(&"--write-auto-subs".to_string()));

        media.subtitles = SubtitleMode::Embed;
        let args = FetchProfile::for_channel(&channel(false, false), &media).ytdlp_args();
        assert!(args.contains(&"--embed-subs".to_string()));
        assert!(!args.contains(&"--convert-subs".to_string()));
    }

    #[test]
    fn test_channel_toggles() {
        let mut c = channel(false, false);
        c.use_sponsorblock = false;
        c.write_info_json = false;
        c.set_mtime = false;
        let args = FetchProfile::for_channel(&c, &MediaConfig::default()).ytdlp_args();
        assert!(!args.contains(&"--sponsorblock-remove".to_string()));
        assert!(!args.contains(&"--write-info-json".to_string()));
        assert!(!args.contains(&"--no-mtime".to_string()));
    }
}
