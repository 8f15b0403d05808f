//! The persisted channel list and its mutable sync state.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use super::types::{validate_name, Channel, ChannelUpdate, SyncState};
use super::RegistryError;
use crate::library::{count_media, LibraryPaths, MediaCount};

/// Serialize `value` as pretty JSON and replace `path` with it.
pub(crate) async fn write_json_atomic<T: Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), RegistryError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| RegistryError::Serialization(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| RegistryError::Io(format!("{}: {}", parent.display(), e)))?;
    }

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| RegistryError::Io(format!("{}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| RegistryError::Io(format!("{}: {}", path.display(), e)))?;
    Ok(())
}

/// A channel admitted to a run, with the state it had before being queued.
#[derive(Debug, Clone)]
pub struct QueuedChannel {
    pub channel: Channel,
    pub previous: SyncState,
}

/// Owns the canonical channel list.
///
/// This is the only writer of `Last_Synced`, `Item_Count`, `Item_Size`
/// and `Remote_Count`.
pub struct ChannelRegistry {
    path: PathBuf,
    library: LibraryPaths,
    channels: RwLock<Vec<Channel>>,
    next_id: AtomicU64,
}

impl ChannelRegistry {
    /// Load the channel list from `path`.
    ///
    /// Never fails: a missing or malformed file yields an empty list and
    /// malformed records are skipped. Channels are sorted by name,
    /// interrupted states become `Incomplete`, and counts are recomputed
    /// from disk.
    pub async fn load(path: impl Into<PathBuf>, library: LibraryPaths) -> Self {
        let path = path.into();
        let records = read_records(&path).await;

        let mut channels: Vec<Channel> = records
            .into_iter()
            .enumerate()
            .filter_map(|(idx, record)| match serde_json::from_value::<Channel>(record) {
                Ok(channel) => Some(channel),
                Err(e) => {
                    error!(index = idx, error = %e, "Skipping malformed channel record");
                    None
                }
            })
            .collect();

        channels.sort_by_key(|c| c.name.to_lowercase());
        normalize_ids(&mut channels);

        for channel in channels.iter_mut() {
            channel.last_synced = std::mem::take(&mut channel.last_synced).recovered();
        }

        let channels = recount_all(channels, &library).await;
        let next_id = channels.iter().map(|c| c.id + 1).max().unwrap_or(0);

        info!(
            path = %path.display(),
            count = channels.len(),
            "Channel list loaded"
        );

        Self {
            path,
            library,
            channels: RwLock::new(channels),
            next_id: AtomicU64::new(next_id),
        }
    }

    /// Registry over an explicit list, without touching disk until persisted.
    pub fn with_channels(
        path: impl Into<PathBuf>,
        library: LibraryPaths,
        mut channels: Vec<Channel>,
    ) -> Self {
        normalize_ids(&mut channels);
        let next_id = channels.iter().map(|c| c.id + 1).max().unwrap_or(0);
        Self {
            path: path.into(),
            library,
            channels: RwLock::new(channels),
            next_id: AtomicU64::new(next_id),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn library(&self) -> &LibraryPaths {
        &self.library
    }

    /// Snapshot of all channels in list order.
    pub async fn list(&self) -> Vec<Channel> {
        self.channels.read().await.clone()
    }

    pub async fn get(&self, id: u64) -> Option<Channel> {
        self.channels.read().await.iter().find(|c| c.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.channels.read().await.is_empty()
    }

    /// Add a channel with the default settings and persist.
    pub async fn add(&self) -> Result<Channel, RegistryError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let channel = Channel::new(id);
        self.channels.write().await.push(channel.clone());
        info!(id, "Channel added");
        self.persist().await?;
        Ok(channel)
    }

    /// Remove a channel and persist. Library files are left alone.
    pub async fn remove(&self, id: u64) -> Result<Channel, RegistryError> {
        let removed = {
            let mut channels = self.channels.write().await;
            let idx = channels
                .iter()
                .position(|c| c.id == id)
                .ok_or(RegistryError::NotFound(id))?;
            channels.remove(idx)
        };
        info!(id, channel = %removed.name, "Channel removed");
        self.persist().await?;
        Ok(removed)
    }

    /// Remove a channel unless a run has it queued or in progress.
    pub async fn remove_if_idle(&self, id: u64) -> Result<Channel, RegistryError> {
        let removed = {
            let mut channels = self.channels.write().await;
            let idx = channels
                .iter()
                .position(|c| c.id == id)
                .ok_or(RegistryError::NotFound(id))?;
            if channels[idx].last_synced.is_active() {
                return Err(RegistryError::Busy(id));
            }
            channels.remove(idx)
        };
        info!(id, channel = %removed.name, "Channel removed");
        self.persist().await?;
        Ok(removed)
    }

    /// Apply the editable fields of `update` and persist.
    pub async fn update(&self, update: &ChannelUpdate) -> Result<Channel, RegistryError> {
        if let Some(ref name) = update.name {
            validate_name(name).map_err(RegistryError::InvalidName)?;
        }

        let updated = {
            let mut channels = self.channels.write().await;
            let channel = channels
                .iter_mut()
                .find(|c| c.id == update.id)
                .ok_or(RegistryError::NotFound(update.id))?;
            channel.apply(update);
            channel.clone()
        };

        info!(id = updated.id, channel = %updated.name, "Channel saved");
        self.persist().await?;
        Ok(updated)
    }

    /// Toggle the paused flag and persist.
    pub async fn set_paused(&self, id: u64, paused: bool) -> Result<Channel, RegistryError> {
        self.update(&ChannelUpdate::pause(id, paused)).await
    }

    /// Move every channel accepted by `eligible` to `Queued`.
    ///
    /// Runs under one write lock so no other run can queue the same
    /// channels in between.
    pub async fn queue_where<F>(&self, mut eligible: F) -> Vec<QueuedChannel>
    where
        F: FnMut(&Channel) -> bool,
    {
        let mut channels = self.channels.write().await;
        let mut queued = Vec::new();
        for channel in channels.iter_mut() {
            if !eligible(channel) {
                continue;
            }
            let previous = std::mem::replace(&mut channel.last_synced, SyncState::Queued);
            queued.push(QueuedChannel {
                channel: channel.clone(),
                previous,
            });
        }
        queued
    }

    pub async fn set_state(&self, id: u64, state: SyncState) -> Result<(), RegistryError> {
        self.modify(id, |c| c.last_synced = state).await
    }

    pub async fn set_counts(&self, id: u64, count: MediaCount) -> Result<(), RegistryError> {
        self.modify(id, |c| {
            c.item_count = count.items;
            c.item_size = count.bytes;
        })
        .await
    }

    pub async fn set_remote_count(&self, id: u64, remote: u64) -> Result<(), RegistryError> {
        self.modify(id, |c| c.remote_count = remote).await
    }

    async fn modify<F>(&self, id: u64, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut Channel),
    {
        let mut channels = self.channels.write().await;
        let channel = channels
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RegistryError::NotFound(id))?;
        f(channel);
        Ok(())
    }

    /// Rewrite the channel list file.
    pub async fn persist(&self) -> Result<(), RegistryError> {
        let snapshot = self.list().await;
        write_json_atomic(&self.path, &snapshot).await?;
        debug!(path = %self.path.display(), count = snapshot.len(), "Channel list saved");
        Ok(())
    }
}

async fn read_records(path: &Path) -> Vec<Value> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No channel list yet");
            return Vec::new();
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read channel list");
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<Value>>(&raw) {
        Ok(records) => records,
        Err(e) => {
            error!(path = %path.display(), error = %e, "Malformed channel list, starting empty");
            Vec::new()
        }
    }
}

/// Keep unique ids; give duplicates fresh ones above the current maximum.
fn normalize_ids(channels: &mut [Channel]) {
    let mut next = channels.iter().map(|c| c.id + 1).max().unwrap_or(0);
    let mut seen = HashSet::new();
    for channel in channels.iter_mut() {
        if !seen.insert(channel.id) {
            warn!(
                channel = %channel.name,
                old_id = channel.id,
                new_id = next,
                "Duplicate channel id reassigned"
            );
            channel.id = next;
            seen.insert(next);
            next += 1;
        }
    }
}

async fn recount_all(channels: Vec<Channel>, library: &LibraryPaths) -> Vec<Channel> {
    let library = library.clone();
    let fallback = channels.clone();
    let result = tokio::task::spawn_blocking(move || {
        channels
            .into_iter()
            .map(|mut channel| {
                let count = library
                    .channel_folder(&channel)
                    .and_then(|folder| count_media(&folder));
                match count {
                    Some(count) => {
                        channel.item_count = count.items;
                        channel.item_size = count.bytes;
                    }
                    None => {
                        channel.last_synced = SyncState::Never;
                        channel.item_count = 0;
                        channel.item_size = 0;
                    }
                }
                channel
            })
            .collect::<Vec<_>>()
    })
    .await;

    match result {
        Ok(channels) => channels,
        Err(e) => {
            error!(error = %e, "Recount task failed, keeping persisted counts");
            fallback
        }
    }
}
