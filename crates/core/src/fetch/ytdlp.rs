//! yt-dlp backed fetcher.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::types::{FetchError, FetchOutcome, FetchProgress, FetchRequest};
use super::Fetcher;
use crate::config::YtDlpConfig;
use crate::library::{has_extension, sanitize_title, ItemTags, TagStore, TAGGED_EXTENSIONS};

/// Prefix of progress lines produced by [`PROGRESS_TEMPLATE`].
const PROGRESS_PREFIX: &str = "[archivist-progress]";

/// One progress line per update, fields separated by `|`.
const PROGRESS_TEMPLATE: &str = "download:[archivist-progress]%(progress._percent_str)s|%(progress._total_bytes_str)s|%(progress._speed_str)s|%(progress._eta_str)s|%(progress.fragment_index)s|%(info.is_live)s";

/// Number of trailing stderr lines kept for error reports.
const STDERR_TAIL: usize = 20;

fn non_placeholder(value: &str) -> Option<String> {
    let value = value.trim();
    match value {
        "" | "NA" | "None" | "N/A" | "Unknown" => None,
        _ => Some(value.to_string()),
    }
}

/// Parse a line written through [`PROGRESS_TEMPLATE`].
fn parse_progress_line(item_id: &str, line: &str) -> Option<FetchProgress> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let fields: Vec<&str> = rest.split('|').collect();
    if fields.len() < 6 {
        return None;
    }

    let percent = fields[0]
        .trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f32>()
        .unwrap_or(0.0)
        .clamp(0.0, 100.0);

    Some(FetchProgress {
        item_id: item_id.to_string(),
        percent,
        total: non_placeholder(fields[1]),
        speed: non_placeholder(fields[2]),
        eta: non_placeholder(fields[3]),
        fragment_index: fields[4].trim().parse::<u64>().ok(),
        is_live: fields[5].trim() == "True",
    })
}

/// Fetcher backed by the yt-dlp binary.
pub struct YtDlpFetcher {
    config: YtDlpConfig,
    tags: Arc<dyn TagStore>,
}

impl YtDlpFetcher {
    pub fn new(config: YtDlpConfig, tags: Arc<dyn TagStore>) -> Self {
        Self { config, tags }
    }

    fn build_args(&self, request: &FetchRequest, temp_dir: &Path) -> Vec<String> {
        let mut args = vec![
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "--no-playlist".to_string(),
            "--ffmpeg-location".to_string(),
            self.config.ffmpeg_location.to_string_lossy().to_string(),
            "--retries".to_string(),
            self.config.retries.to_string(),
            "--fragment-retries".to_string(),
            self.config.fragment_retries.to_string(),
            "--paths".to_string(),
            format!("home:{}", request.folder.display()),
            "--paths".to_string(),
            format!("temp:{}", temp_dir.display()),
            "--output".to_string(),
            format!("{}.%(ext)s", sanitize_title(&request.item.title)),
        ];
        if self.config.verbose {
            args.push("--verbose".to_string());
        }
        args.extend(request.profile.ytdlp_args());
        args.extend(request.tuning.ytdlp_args());
        args.push(request.item.url.clone());
        args
    }

    async fn stamp_tags(&self, path: &Path, request: &FetchRequest) {
        if !self.config.stamp_tags || !has_extension(path, TAGGED_EXTENSIONS) {
            return;
        }

        let tags = self.tags.clone();
        let path = path.to_path_buf();
        let item_tags = ItemTags {
            id: request.item.id.clone(),
            title: request.item.title.clone(),
            created: Local::now().naive_local(),
        };

        let result =
            tokio::task::spawn_blocking(move || tags.write_item_tags(&path, &item_tags)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(item = %request.item.id, error = %e, "Failed to stamp tags"),
            Err(e) => warn!(item = %request.item.id, error = %e, "Tag task failed"),
        }
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn fetch(
        &self,
        request: FetchRequest,
        progress_tx: mpsc::Sender<FetchProgress>,
    ) -> Result<FetchOutcome, FetchError> {
        tokio::fs::create_dir_all(&request.folder).await?;
        let temp_dir = tempfile::Builder::new()
            .prefix(".fetch-")
            .tempdir_in(&request.folder)?;

        let args = self.build_args(&request, temp_dir.path());
        debug!(item = %request.item.id, args = ?args, "Starting yt-dlp");

        let mut child = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    FetchError::BackendNotFound(self.config.binary.display().to_string())
                } else {
                    FetchError::Io(e)
                }
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::failed("stdout not captured", None))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchError::failed("stderr not captured", None))?;

        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut tail: Vec<String> = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() == STDERR_TAIL {
                    tail.remove(0);
                }
                tail.push(line);
            }
            tail.join("\n")
        });

        let mut final_path: Option<PathBuf> = None;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(progress) = parse_progress_line(&request.item.id, &line) {
                // Non-blocking send
                let _ = progress_tx.try_send(progress);
            } else if !line.trim().is_empty() {
                final_path = Some(PathBuf::from(line.trim()));
            }
        }

        let status = child.wait().await?;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(FetchError::failed(
                format!("yt-dlp exited with code: {:?}", status.code()),
                (!stderr_tail.is_empty()).then_some(stderr_tail),
            ));
        }

        if let Some(ref path) = final_path {
            self.stamp_tags(path, &request).await;
        }

        info!(item = %request.item.id, path = ?final_path, "Item fetched");
        Ok(FetchOutcome { path: final_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FetchTuning;
    use crate::channel::Channel;
    use crate::config::MediaConfig;
    use crate::fetch::{FetchProfile, PendingItem};
    use crate::testing::MockTagStore;
    use chrono::NaiveDate;

    fn request() -> FetchRequest {
        FetchRequest {
            item: PendingItem {
                id: "abcdefghijk".to_string(),
                title: "A: Title? [abcdefghijk]".to_string(),
                upload_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                url: "https://www.youtube.com/watch?v=abcdefghijk".to_string(),
                channel_title: Some("Chan".to_string()),
            },
            folder: PathBuf::from("/lib/video/Chan"),
            profile: FetchProfile::for_channel(&Channel::new(0), &MediaConfig::default()),
            tuning: FetchTuning {
                slow: true,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_parse_progress_line() {
        let line = "[archivist-progress] 42.5%|  10.00MiB|1.20MiB/s|00:05|NA|False";
        let progress = parse_progress_line("id1", line).unwrap();
        assert_eq!(progress.item_id, "id1");
        assert!((progress.percent - 42.5).abs() < f32::EPSILON);
        assert_eq!(progress.total.as_deref(), Some("10.00MiB"));
        assert_eq!(progress.eta.as_deref(), Some("00:05"));
        assert_eq!(progress.fragment_index, None);
        assert!(!progress.is_live);
    }

    #[test]
    fn test_parse_live_progress_line() {
        let line = "[archivist-progress]NA|NA|NA|NA|30|True";
        let progress = parse_progress_line("id1", line).unwrap();
        assert_eq!(progress.percent, 0.0);
        assert_eq!(progress.fragment_index, Some(30));
        assert!(progress.is_live);
        assert!(progress.total.is_none());
    }

    #[test]
    fn test_non_progress_lines_are_ignored() {
        assert!(parse_progress_line("id1", "/lib/video/Chan/file.mp4").is_none());
        assert!(parse_progress_line("id1", "[archivist-progress]1%|2").is_none());
    }

    #[test]
    fn test_build_args() {
        let fetcher = YtDlpFetcher::new(YtDlpConfig::default(), Arc::new(MockTagStore::new()));
        let args = fetcher.build_args(&request(), Path::new("/lib/video/Chan/.fetch-x"));

        assert!(args
            .windows(2)
            .any(|w| w[0] == "--output" && w[1] == "A Title [abcdefghijk].%(ext)s"));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--paths" && w[1] == "home:/lib/video/Chan"));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--paths" && w[1] == "temp:/lib/video/Chan/.fetch-x"));
        assert!(args.contains(&"--sleep-requests".to_string()));
        assert_eq!(
            args.last().map(String::as_str),
            Some("https://www.youtube.com/watch?v=abcdefghijk")
        );
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = YtDlpConfig {
            binary: PathBuf::from("/nonexistent/yt-dlp"),
            ..Default::default()
        };
        let fetcher = YtDlpFetcher::new(config, Arc::new(MockTagStore::new()));
        let mut req = request();
        req.folder = dir.path().join("Chan");
        let (tx, _rx) = mpsc::channel(4);

        let result = fetcher.fetch(req, tx).await;
        assert!(matches!(result, Err(FetchError::BackendNotFound(_))));
    }
}
