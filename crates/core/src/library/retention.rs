//! Retention cleanup of aged library files.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Local};
use tracing::{debug, error, info, warn};

use super::tags::{created_to_local, TagStore};
use super::{
    extension_of, has_extension, AUDIO_EXTENSIONS, SUBTITLE_EXTENSION, TAGGED_EXTENSIONS,
    VIDEO_EXTENSIONS,
};
use crate::channel::{Channel, PERMANENT_RETENTION};
use crate::config::SubtitleMode;

/// What to expire in one channel folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Maximum age in days; [`PERMANENT_RETENTION`] disables cleanup.
    pub keep_days: i64,
    pub audio_only: bool,
    pub subtitles: SubtitleMode,
}

impl RetentionPolicy {
    pub fn for_channel(channel: &Channel, subtitles: SubtitleMode) -> Self {
        Self {
            keep_days: channel.keep_days,
            audio_only: channel.audio_only,
            subtitles,
        }
    }

    /// Whether files of this path's kind are subject to the policy.
    fn applies_to(&self, path: &Path) -> bool {
        let video = !self.audio_only && has_extension(path, VIDEO_EXTENSIONS);
        let audio = self.audio_only && has_extension(path, AUDIO_EXTENSIONS);
        let subtitle = self.subtitles == SubtitleMode::External
            && extension_of(path).as_deref() == Some(SUBTITLE_EXTENSION);
        video || audio || subtitle
    }
}

/// Result of one cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted: usize,
    pub kept: usize,
    pub errors: usize,
}

impl CleanupReport {
    pub fn changed_files(&self) -> bool {
        self.deleted > 0
    }
}

/// Effective timestamp of a file: embedded recording date, else mtime.
fn effective_time(path: &Path, tags: &dyn TagStore) -> std::io::Result<DateTime<Local>> {
    if has_extension(path, TAGGED_EXTENSIONS) {
        match tags.read_created(path) {
            Ok(Some(created)) => {
                if let Some(local) = created_to_local(created) {
                    return Ok(local);
                }
            }
            Ok(None) => {
                debug!(path = %path.display(), "No recording date tag, using mtime");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read recording date, using mtime");
            }
        }
    }

    let modified = fs::metadata(path)?.modified()?;
    Ok(DateTime::<Local>::from(modified))
}

/// Delete files in `folder` older than the policy allows.
///
/// Age equal to the window is kept. Per-file errors are logged and
/// counted, never aborting the pass.
pub fn cleanup(
    folder: &Path,
    policy: &RetentionPolicy,
    tags: &dyn TagStore,
    now: DateTime<Local>,
) -> CleanupReport {
    let mut report = CleanupReport::default();

    if policy.keep_days == PERMANENT_RETENTION {
        debug!(folder = %folder.display(), "Permanent retention, skipping cleanup");
        return report;
    }

    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            error!(folder = %folder.display(), error = %e, "Failed to list folder for cleanup");
            report.errors += 1;
            return report;
        }
    };

    let window = Duration::days(policy.keep_days);

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || !policy.applies_to(&path) {
            continue;
        }

        let effective = match effective_time(&path, tags) {
            Ok(t) => t,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Cannot determine file age");
                report.errors += 1;
                continue;
            }
        };

        let age = now.signed_duration_since(effective);
        if age > window {
            match fs::remove_file(&path) {
                Ok(()) => {
                    info!(
                        path = %path.display(),
                        age_days = age.num_days(),
                        "Deleted expired file"
                    );
                    report.deleted += 1;
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to delete expired file");
                    report.errors += 1;
                }
            }
        } else {
            debug!(
                path = %path.display(),
                age_days = age.num_days(),
                keep_days = policy.keep_days,
                "Keeping file"
            );
            report.kept += 1;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTagStore;
    use std::path::PathBuf;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn file_aged(dir: &Path, name: &str, now: DateTime<Local>, age: Duration) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"x").unwrap();
        let mtime: SystemTime = (now - age).into();
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        path
    }

    fn policy(keep_days: i64) -> RetentionPolicy {
        RetentionPolicy {
            keep_days,
            audio_only: false,
            subtitles: SubtitleMode::None,
        }
    }

    #[test]
    fn test_permanent_retention_deletes_nothing() {
        let dir = TempDir::new().unwrap();
        let now = Local::now();
        let old = file_aged(dir.path(), "ancient.mp4", now, Duration::days(5000));

        let report = cleanup(dir.path(), &policy(-1), &MockTagStore::new(), now);
        assert_eq!(report, CleanupReport::default());
        assert!(old.exists());
    }

    #[test]
    fn test_age_boundary() {
        let dir = TempDir::new().unwrap();
        let now = Local::now();
        let expired = file_aged(
            dir.path(),
            "expired.mkv",
            now,
            Duration::days(7) + Duration::minutes(1),
        );
        // Exactly 7 days old by tag
        let exact = file_aged(dir.path(), "exact.mp4", now, Duration::hours(1));
        let fresh = file_aged(dir.path(), "fresh.mkv", now, Duration::days(2));
        let tags = MockTagStore::new();
        tags.set_created(&exact, (now - Duration::days(7)).naive_local());

        let report = cleanup(dir.path(), &policy(7), &tags, now);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.kept, 2);
        assert!(!expired.exists());
        assert!(exact.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn test_embedded_date_wins_over_mtime() {
        let dir = TempDir::new().unwrap();
        let now = Local::now();
        // Fresh on disk, but tagged as uploaded 30 days ago
        let tagged = file_aged(dir.path(), "tagged.mp4", now, Duration::hours(1));
        let tags = MockTagStore::new();
        tags.set_created(&tagged, (now - Duration::days(30)).naive_local());

        let report = cleanup(dir.path(), &policy(7), &tags, now);
        assert_eq!(report.deleted, 1);
        assert!(!tagged.exists());
    }

    #[test]
    fn test_unreadable_tag_falls_back_to_mtime() {
        let dir = TempDir::new().unwrap();
        let now = Local::now();
        let path = file_aged(dir.path(), "broken.mp4", now, Duration::days(1));
        let tags = MockTagStore::new();
        tags.set_read_error(&path);

        let report = cleanup(dir.path(), &policy(7), &tags, now);
        assert_eq!(report.kept, 1);
        assert_eq!(report.errors, 0);
        assert!(path.exists());
    }

    #[test]
    fn test_only_active_media_kind_is_eligible() {
        let dir = TempDir::new().unwrap();
        let now = Local::now();
        let old = Duration::days(100);
        let video = file_aged(dir.path(), "v.mp4", now, old);
        let audio = file_aged(dir.path(), "a.m4a", now, old);
        let subs = file_aged(dir.path(), "v.en.srt", now, old);
        let other = file_aged(dir.path(), "v.info.json", now, old);

        let audio_policy = RetentionPolicy {
            keep_days: 7,
            audio_only: true,
            subtitles: SubtitleMode::None,
        };
        let report = cleanup(dir.path(), &audio_policy, &MockTagStore::new(), now);
        assert_eq!(report.deleted, 1);
        assert!(video.exists());
        assert!(!audio.exists());
        assert!(subs.exists());
        assert!(other.exists());
    }

    #[test]
    fn test_external_subtitles_are_expired() {
        let dir = TempDir::new().unwrap();
        let now = Local::now();
        let subs = file_aged(dir.path(), "v.en.srt", now, Duration::days(10));

        let subtitle_policy = RetentionPolicy {
            keep_days: 7,
            audio_only: false,
            subtitles: SubtitleMode::External,
        };
        let report = cleanup(dir.path(), &subtitle_policy, &MockTagStore::new(), now);
        assert_eq!(report.deleted, 1);
        assert!(!subs.exists());
    }

    #[test]
    fn test_missing_folder_counts_error() {
        let dir = TempDir::new().unwrap();
        let report = cleanup(
            &dir.path().join("gone"),
            &policy(7),
            &MockTagStore::new(),
            Local::now(),
        );
        assert_eq!(report.errors, 1);
        assert_eq!(report.deleted, 0);
    }
}
