//! Channel folder inspection.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tracing::{debug, error, warn};

use super::tags::TagStore;
use super::{has_extension, AUDIO_EXTENSIONS, TAGGED_EXTENSIONS, VIDEO_EXTENSIONS};

/// Bracketed id token in a file stem, e.g. `Some Title [dQw4w9WgXcQ]`.
static BRACKETED_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([0-9A-Za-z_-]{10,}[048AEIMQUYcgkosw])\]").unwrap());

/// Items already present in a channel folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalPresence {
    /// Item ids recovered from file names or embedded tags.
    pub ids: HashSet<String>,
    /// File stems of every media file.
    pub names: HashSet<String>,
}

impl LocalPresence {
    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.names.is_empty()
    }
}

/// Media file count and total folder size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaCount {
    pub items: u64,
    pub bytes: u64,
}

/// Extract the bracketed id token from a file stem.
pub fn extract_bracketed_id(stem: &str) -> Option<&str> {
    BRACKETED_ID
        .captures(stem)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn is_media(path: &Path) -> bool {
    has_extension(path, VIDEO_EXTENSIONS) || has_extension(path, AUDIO_EXTENSIONS)
}

/// Collect present ids and name stems from a folder.
///
/// A missing or unreadable folder yields an empty result. Per-file
/// failures are logged and skipped.
pub fn scan_folder(folder: &Path, tags: &dyn TagStore) -> LocalPresence {
    let mut presence = LocalPresence::default();

    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            error!(folder = %folder.display(), error = %e, "Failed to list channel folder");
            return presence;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || !is_media(&path) {
            continue;
        }

        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!(path = %path.display(), "Skipping file with non UTF-8 name");
            continue;
        };
        presence.names.insert(stem.to_string());

        if let Some(id) = extract_bracketed_id(stem) {
            presence.ids.insert(id.to_string());
            continue;
        }

        if !has_extension(&path, TAGGED_EXTENSIONS) {
            continue;
        }

        match tags.read_comment(&path) {
            Ok(Some(id)) => {
                presence.ids.insert(id);
            }
            Ok(None) => {
                debug!(path = %path.display(), "No embedded id");
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "Cannot read embedded id");
            }
        }
    }

    debug!(
        folder = %folder.display(),
        files = presence.names.len(),
        ids = presence.ids.len(),
        "Scanned channel folder"
    );

    presence
}

/// Count media files and sum the size of every regular file in a folder.
///
/// Returns `None` when the folder does not exist.
pub fn count_media(folder: &Path) -> Option<MediaCount> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            if folder.exists() {
                warn!(folder = %folder.display(), error = %e, "Failed to list channel folder");
            }
            return None;
        }
    };

    let mut count = MediaCount::default();
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        count.bytes += metadata.len();
        if is_media(&path) {
            count.items += 1;
        }
    }

    Some(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTagStore;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str, bytes: usize) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, vec![0u8; bytes]).unwrap();
        path
    }

    #[test]
    fn test_extract_bracketed_id() {
        assert_eq!(
            extract_bracketed_id("My Video [dQw4w9WgXcQ]"),
            Some("dQw4w9WgXcQ")
        );
        // Last character must be one of the allowed id endings
        assert_eq!(extract_bracketed_id("My Video [dQw4w9WgXcZ]"), None);
        // Too short
        assert_eq!(extract_bracketed_id("My Video [abc]"), None);
        assert_eq!(extract_bracketed_id("No id here"), None);
    }

    #[test]
    fn test_scan_prefers_filename_id() {
        let dir = TempDir::new().unwrap();
        let tagged = touch(dir.path(), "First [dQw4w9WgXcQ].mp4", 10);
        touch(dir.path(), "Second.mkv", 10);

        let tags = MockTagStore::new();
        tags.set_comment(&tagged, "ignored-because-filename-wins");

        let presence = scan_folder(dir.path(), &tags);
        assert!(presence.contains_id("dQw4w9WgXcQ"));
        assert!(!presence.contains_id("ignored-because-filename-wins"));
        assert!(presence.contains_name("First [dQw4w9WgXcQ]"));
        assert!(presence.contains_name("Second"));
        assert_eq!(presence.ids.len(), 1);
    }

    #[test]
    fn test_scan_falls_back_to_embedded_comment() {
        let dir = TempDir::new().unwrap();
        let audio = touch(dir.path(), "Episode.m4a", 10);
        let mkv = touch(dir.path(), "Clip.mkv", 10);

        let tags = MockTagStore::new();
        tags.set_comment(&audio, "abcdefghijk");
        // mkv is not a tagged container, so its tag is never consulted
        tags.set_comment(&mkv, "zzzzzzzzzzk");

        let presence = scan_folder(dir.path(), &tags);
        assert!(presence.contains_id("abcdefghijk"));
        assert!(!presence.contains_id("zzzzzzzzzzk"));
        assert_eq!(presence.names.len(), 2);
    }

    #[test]
    fn test_scan_ignores_non_media_and_tag_errors() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "notes.txt", 10);
        touch(dir.path(), "Episode.en.srt", 10);
        let broken = touch(dir.path(), "Broken.mp4", 10);
        fs::create_dir(dir.path().join("sub.mp4")).unwrap();

        let tags = MockTagStore::new();
        tags.set_read_error(&broken);

        let presence = scan_folder(dir.path(), &tags);
        assert!(presence.ids.is_empty());
        assert_eq!(presence.names.len(), 1);
        assert!(presence.contains_name("Broken"));
    }

    #[test]
    fn test_scan_missing_folder_is_empty() {
        let dir = TempDir::new().unwrap();
        let presence = scan_folder(&dir.path().join("missing"), &MockTagStore::new());
        assert!(presence.is_empty());
    }

    #[test]
    fn test_count_media() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.mp4", 100);
        touch(dir.path(), "b.M4A", 50);
        touch(dir.path(), "b.info.json", 7);
        touch(dir.path(), "b.en.srt", 3);

        let count = count_media(dir.path()).unwrap();
        assert_eq!(count.items, 2);
        assert_eq!(count.bytes, 160);
    }

    #[test]
    fn test_count_media_missing_folder() {
        let dir = TempDir::new().unwrap();
        assert_eq!(count_media(&dir.path().join("missing")), None);
    }
}
