//! Local library: folder layout, scanning, retention, and embedded tags.

mod retention;
mod scanner;
mod tags;

pub use retention::{cleanup, CleanupReport, RetentionPolicy};
pub use scanner::{count_media, extract_bracketed_id, scan_folder, LocalPresence, MediaCount};
pub use tags::{
    created_to_local, parse_created, ItemTags, LoftyTagStore, TagError, TagStore,
    CREATED_TAG_FORMAT,
};

use std::path::{Path, PathBuf};

use crate::channel::Channel;
use crate::config::PathsConfig;

/// Extensions of fetched video files.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv"];

/// Extensions of fetched audio files.
pub const AUDIO_EXTENSIONS: &[&str] = &["m4a"];

/// Containers that carry the tags in [`TagStore`].
pub const TAGGED_EXTENSIONS: &[&str] = &["mp4", "m4a"];

/// Extension of external subtitle files.
pub const SUBTITLE_EXTENSION: &str = "srt";

/// Characters replaced when turning a title into a file name.
const UNSAFE_FILENAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Lowercased extension of a path, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub(crate) fn has_extension(path: &Path, set: &[&str]) -> bool {
    extension_of(path).is_some_and(|ext| set.contains(&ext.as_str()))
}

/// Make a title safe to use as a file stem.
///
/// Unsafe characters become spaces, whitespace runs collapse, ends are trimmed.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .map(|c| if UNSAFE_FILENAME_CHARS.contains(&c) { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Library roots for the two media kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryPaths {
    pub video_root: PathBuf,
    pub audio_root: PathBuf,
}

impl LibraryPaths {
    pub fn new(video_root: impl Into<PathBuf>, audio_root: impl Into<PathBuf>) -> Self {
        Self {
            video_root: video_root.into(),
            audio_root: audio_root.into(),
        }
    }

    /// Root the channel's folder lives under.
    pub fn root_for(&self, channel: &Channel) -> &Path {
        if channel.audio_only {
            &self.audio_root
        } else {
            &self.video_root
        }
    }

    /// The channel's storage folder, `<root>/<Name>`.
    ///
    /// Returns `None` for an empty name so nothing ever operates on the root itself.
    pub fn channel_folder(&self, channel: &Channel) -> Option<PathBuf> {
        let name = channel.name.trim();
        if name.is_empty() {
            return None;
        }
        Some(self.root_for(channel).join(name))
    }
}

impl From<&PathsConfig> for LibraryPaths {
    fn from(paths: &PathsConfig) -> Self {
        Self::new(paths.video_dir.clone(), paths.audio_dir.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title() {
        assert_eq!(sanitize_title("What? A / Title"), "What A Title");
        assert_eq!(sanitize_title("  a:b*c  "), "a b c");
        assert_eq!(sanitize_title("plain"), "plain");
        assert_eq!(sanitize_title("\"quoted\" <tag>|pipe"), "quoted tag pipe");
    }

    #[test]
    fn test_channel_folder_by_kind() {
        let paths = LibraryPaths::new("/lib/video", "/lib/audio");
        let mut channel = Channel::new(1);
        channel.name = "Talks".to_string();
        assert_eq!(
            paths.channel_folder(&channel),
            Some(PathBuf::from("/lib/video/Talks"))
        );

        channel.audio_only = true;
        assert_eq!(
            paths.channel_folder(&channel),
            Some(PathBuf::from("/lib/audio/Talks"))
        );
    }

    #[test]
    fn test_channel_folder_requires_name() {
        let paths = LibraryPaths::new("/lib/video", "/lib/audio");
        let mut channel = Channel::new(1);
        channel.name = "   ".to_string();
        assert_eq!(paths.channel_folder(&channel), None);
    }

    #[test]
    fn test_extension_matching_is_case_insensitive() {
        assert!(has_extension(Path::new("a.MP4"), VIDEO_EXTENSIONS));
        assert!(has_extension(Path::new("a.m4a"), AUDIO_EXTENSIONS));
        assert!(!has_extension(Path::new("a.webm"), VIDEO_EXTENSIONS));
        assert!(!has_extension(Path::new("noext"), VIDEO_EXTENSIONS));
    }
}
