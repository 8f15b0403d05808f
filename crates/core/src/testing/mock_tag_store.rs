//! In-memory tag store for testing.

use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::library::{ItemTags, TagError, TagStore};

/// Tags held in memory and keyed by path.
///
/// Methods are synchronous like the trait, so this works both in plain
/// tests and on blocking threads.
#[derive(Debug, Default)]
pub struct MockTagStore {
    comments: RwLock<HashMap<PathBuf, String>>,
    created: RwLock<HashMap<PathBuf, NaiveDateTime>>,
    read_errors: RwLock<HashSet<PathBuf>>,
    written: RwLock<Vec<(PathBuf, ItemTags)>>,
}

impl MockTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_comment(&self, path: &Path, comment: &str) {
        self.comments
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_path_buf(), comment.to_string());
    }

    pub fn set_created(&self, path: &Path, created: NaiveDateTime) {
        self.created
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_path_buf(), created);
    }

    /// Make every read of this path fail.
    pub fn set_read_error(&self, path: &Path) {
        self.read_errors
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_path_buf());
    }

    /// Tags written so far, in call order.
    pub fn recorded_writes(&self) -> Vec<(PathBuf, ItemTags)> {
        self.written
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn check_readable(&self, path: &Path) -> Result<(), TagError> {
        let failing = self
            .read_errors
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(path);
        if failing {
            return Err(TagError::Read {
                path: path.display().to_string(),
                reason: "simulated read error".to_string(),
            });
        }
        Ok(())
    }
}

impl TagStore for MockTagStore {
    fn read_comment(&self, path: &Path) -> Result<Option<String>, TagError> {
        self.check_readable(path)?;
        Ok(self
            .comments
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned())
    }

    fn read_created(&self, path: &Path) -> Result<Option<NaiveDateTime>, TagError> {
        self.check_readable(path)?;
        Ok(self
            .created
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .copied())
    }

    fn write_item_tags(&self, path: &Path, tags: &ItemTags) -> Result<(), TagError> {
        self.set_comment(path, &tags.id);
        self.set_created(path, tags.created);
        self.written
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((path.to_path_buf(), tags.clone()));
        Ok(())
    }
}
