//! Embedded tags on MP4-family containers.
//!
//! The comment atom carries the item id and the recording-date atom
//! carries the upload time, so a library keeps its identity even when
//! files are renamed.

use std::path::Path;

use chrono::{Local, NaiveDateTime, TimeZone};
use lofty::config::WriteOptions;
use lofty::file::TaggedFileExt;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt};
use thiserror::Error;
use tracing::debug;

/// Format of the recording-date tag written by the fetcher.
pub const CREATED_TAG_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors from tag access.
#[derive(Debug, Error)]
pub enum TagError {
    #[error("Failed to read tags from {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to write tags to {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("File has no tag block: {0}")]
    NoTag(String),
}

/// Tags stamped on a fetched item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemTags {
    pub id: String,
    pub title: String,
    /// When the item entered the library, written in [`CREATED_TAG_FORMAT`].
    pub created: NaiveDateTime,
}

/// Reads and writes the small fixed set of tags the library relies on.
///
/// Calls are blocking; run them on a blocking thread.
pub trait TagStore: Send + Sync {
    /// The embedded comment, used as the item id.
    fn read_comment(&self, path: &Path) -> Result<Option<String>, TagError>;

    /// The recording-date tag, if present and parsable.
    fn read_created(&self, path: &Path) -> Result<Option<NaiveDateTime>, TagError>;

    /// Write id, title, and creation time onto the file.
    fn write_item_tags(&self, path: &Path, tags: &ItemTags) -> Result<(), TagError>;
}

/// Parse a recording-date tag value.
pub fn parse_created(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), CREATED_TAG_FORMAT).ok()
}

/// Interpret a tag time as local wall-clock time.
pub fn created_to_local(created: NaiveDateTime) -> Option<chrono::DateTime<Local>> {
    Local.from_local_datetime(&created).earliest()
}

/// [`TagStore`] backed by lofty.
#[derive(Debug, Default, Clone)]
pub struct LoftyTagStore;

impl LoftyTagStore {
    pub fn new() -> Self {
        Self
    }

    fn read_string(&self, path: &Path, key: &ItemKey) -> Result<Option<String>, TagError> {
        let tagged_file = lofty::read_from_path(path).map_err(|e| TagError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let tag = match tagged_file.primary_tag() {
            Some(tag) => Some(tag),
            None => tagged_file.first_tag(),
        };

        Ok(tag
            .and_then(|t| t.get_string(key))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }
}

impl TagStore for LoftyTagStore {
    fn read_comment(&self, path: &Path) -> Result<Option<String>, TagError> {
        self.read_string(path, &ItemKey::Comment)
    }

    fn read_created(&self, path: &Path) -> Result<Option<NaiveDateTime>, TagError> {
        let raw = self.read_string(path, &ItemKey::RecordingDate)?;
        let parsed = raw.as_deref().and_then(parse_created);
        if raw.is_some() && parsed.is_none() {
            debug!(path = %path.display(), "Unparsable recording date tag");
        }
        Ok(parsed)
    }

    fn write_item_tags(&self, path: &Path, tags: &ItemTags) -> Result<(), TagError> {
        let write_err = |reason: String| TagError::Write {
            path: path.display().to_string(),
            reason,
        };

        let mut tagged_file =
            lofty::read_from_path(path).map_err(|e| write_err(e.to_string()))?;

        if tagged_file.primary_tag().is_none() {
            let tag_type = tagged_file.primary_tag_type();
            tagged_file.insert_tag(Tag::new(tag_type));
        }

        let tag = tagged_file
            .primary_tag_mut()
            .ok_or_else(|| TagError::NoTag(path.display().to_string()))?;

        tag.set_title(tags.title.clone());
        tag.insert_text(ItemKey::Comment, tags.id.clone());
        tag.insert_text(
            ItemKey::RecordingDate,
            tags.created.format(CREATED_TAG_FORMAT).to_string(),
        );

        tag.save_to_path(path, WriteOptions::default())
            .map_err(|e| write_err(e.to_string()))?;

        debug!(path = %path.display(), id = %tags.id, "Stamped item tags");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_created() {
        let parsed = parse_created("2024-05-01 08:30:00").unwrap();
        assert_eq!(
            parsed,
            NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap()
        );
        assert!(parse_created("2024-05-01").is_none());
        assert!(parse_created("yesterday").is_none());
    }

    #[test]
    fn test_lofty_read_fails_on_non_media() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("fake.mp4");
        std::fs::write(&path, b"not really an mp4").unwrap();

        let store = LoftyTagStore::new();
        assert!(matches!(
            store.read_comment(&path),
            Err(TagError::Read { .. })
        ));
    }
}
