//! Types for the sync engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::channel::RegistryError;

/// Channel failures after which a run stops dispatching.
pub const MAX_RUN_FAILURES: usize = 3;

/// Consecutive item failures after which a channel gives up.
pub const MAX_CONSECUTIVE_ITEM_FAILURES: usize = 3;

/// Aggregate result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// No channel failed.
    Complete,
    /// Some, but not all, channels failed.
    Partial,
    /// The error budget ran out or every admitted channel failed.
    TotalFailure,
}

impl RunOutcome {
    pub fn from_counts(admitted: usize, failures: usize) -> Self {
        if failures == 0 {
            Self::Complete
        } else if failures >= MAX_RUN_FAILURES || failures >= admitted {
            Self::TotalFailure
        } else {
            Self::Partial
        }
    }

    /// Whether clients should see the run as successful.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::TotalFailure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::TotalFailure => "total_failure",
        }
    }
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Channels marked `Queued` at admission.
    pub admitted: usize,
    /// Channels that actually ran.
    pub dispatched: usize,
    pub failures: usize,
    pub files_changed: bool,
    pub outcome: RunOutcome,
}

/// What syncing one channel did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelReport {
    pub channel_id: u64,
    pub fetched: usize,
    pub failed_items: usize,
    pub deleted: usize,
    /// Whether the channel counted against the run's error budget.
    pub failed: bool,
}

/// Errors from resolving a channel's pending items.
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("Listing failed: {0}")]
    Listing(#[from] CatalogError),

    #[error("Too many consecutive detail failures ({0})")]
    TooManyFailures(usize),
}

/// Errors that end a channel's sync early.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid channel configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot prepare folder {path}: {reason}")]
    Folder { path: String, reason: String },

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}
