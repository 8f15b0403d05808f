//! Types for item fetching.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::profile::FetchProfile;
use crate::catalog::FetchTuning;

/// A remote item selected for fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingItem {
    pub id: String,
    /// Display title, suffixed with ` [id]` when ids go into file names.
    pub title: String,
    pub upload_date: NaiveDate,
    pub url: String,
    /// Title of the remote channel the item belongs to.
    pub channel_title: Option<String>,
}

/// Everything needed to fetch one item.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub item: PendingItem,
    /// Channel folder the finished file lands in.
    pub folder: PathBuf,
    pub profile: FetchProfile,
    pub tuning: FetchTuning,
}

/// Progress of a running fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchProgress {
    pub item_id: String,
    /// 0-100, 0 when unknown (e.g. live streams).
    pub percent: f32,
    pub total: Option<String>,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub fragment_index: Option<u64>,
    pub is_live: bool,
}

/// A finished fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    /// Final path of the produced file, when the backend reports it.
    pub path: Option<PathBuf>,
}

/// Errors that can occur while fetching an item.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Fetch backend not found at path: {0}")]
    BackendNotFound(String),

    #[error("Fetch failed: {reason}")]
    Failed {
        reason: String,
        stderr: Option<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    pub fn failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
            stderr,
        }
    }
}

/// Decides which progress updates are worth a log line.
///
/// Regular items log every 5%; live items log every 10th fragment.
#[derive(Debug, Default)]
pub struct ProgressThrottle {
    next_percent: f32,
}

impl ProgressThrottle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_log(&mut self, progress: &FetchProgress) -> bool {
        if progress.is_live {
            return progress
                .fragment_index
                .is_some_and(|idx| idx > 0 && idx % 10 == 0);
        }

        if progress.percent < self.next_percent {
            return false;
        }
        self.next_percent = ((progress.percent / 5.0).floor() + 1.0) * 5.0;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(percent: f32) -> FetchProgress {
        FetchProgress {
            item_id: "x".to_string(),
            percent,
            total: None,
            speed: None,
            eta: None,
            fragment_index: None,
            is_live: false,
        }
    }

    #[test]
    fn test_throttle_logs_every_five_percent() {
        let mut throttle = ProgressThrottle::new();
        let logged: Vec<f32> = [0.0, 1.0, 4.9, 5.0, 7.5, 10.2, 11.0, 99.0, 100.0]
            .into_iter()
            .filter(|p| throttle.should_log(&progress(*p)))
            .collect();
        assert_eq!(logged, vec![0.0, 5.0, 10.2, 99.0, 100.0]);
    }

    #[test]
    fn test_throttle_live_every_tenth_fragment() {
        let mut throttle = ProgressThrottle::new();
        let mut live = progress(0.0);
        live.is_live = true;

        live.fragment_index = Some(9);
        assert!(!throttle.should_log(&live));
        live.fragment_index = Some(10);
        assert!(throttle.should_log(&live));
        live.fragment_index = None;
        assert!(!throttle.should_log(&live));
    }
}
