//! Remote/local diff: which listed items still need fetching.

use chrono::{DateTime, Duration, Local, NaiveTime};
use tracing::{debug, error, info};

use super::types::{DiffError, MAX_CONSECUTIVE_ITEM_FAILURES};
use crate::catalog::{FetchTuning, LiveStatus, RemoteCatalog, RemoteEntry};
use crate::channel::{Channel, LiveRule};
use crate::fetch::PendingItem;
use crate::library::{sanitize_title, LocalPresence};

/// Run-wide inputs to the diff.
#[derive(Debug, Clone, Copy)]
pub struct DiffOptions {
    /// Non-live items younger than this are left for a later run.
    pub defer_hours: f64,
    /// Suffix display titles with ` [id]`.
    pub include_id_in_filename: bool,
    pub now: DateTime<Local>,
}

/// Items to fetch for one channel, in listing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Remote title of the channel.
    pub channel_title: Option<String>,
    /// Entries in the remote listing.
    pub listed: usize,
    pub pending: Vec<PendingItem>,
}

fn display_title(entry: &RemoteEntry, include_id: bool) -> String {
    if include_id {
        format!("{} [{}]", entry.title, entry.id)
    } else {
        entry.title.clone()
    }
}

fn is_present(presence: &LocalPresence, entry: &RemoteEntry, title: &str) -> bool {
    presence.contains_id(&entry.id)
        || presence.contains_name(title)
        || presence.contains_name(&sanitize_title(title))
}

fn passes_title_filter(channel: &Channel, title: &str) -> bool {
    if channel.filter_title_text.is_empty() {
        return true;
    }
    let contains = title
        .to_lowercase()
        .contains(&channel.filter_title_text.to_lowercase());
    contains != channel.negate_filter
}

enum Step {
    Skip,
    Stop,
    Take,
}

/// Live-rule gate, applied before anything else.
fn live_step(rule: LiveRule, status: Option<&LiveStatus>, already_selected: bool) -> Step {
    match rule {
        LiveRule::Only => {
            if already_selected {
                return Step::Stop;
            }
            match status {
                Some(LiveStatus::IsUpcoming) => Step::Skip,
                Some(s) if s.is_active() => Step::Take,
                _ => Step::Stop,
            }
        }
        LiveRule::Ignore if status.is_some() => Step::Skip,
        LiveRule::Ignore | LiveRule::Include => Step::Take,
    }
}

/// Resolve the items of `channel` that still need fetching.
///
/// Iteration follows the listing order. Three consecutive detail failures
/// abort the whole resolution; a successful lookup resets the streak.
pub async fn resolve(
    channel: &Channel,
    presence: &LocalPresence,
    catalog: &dyn RemoteCatalog,
    tuning: &FetchTuning,
    options: &DiffOptions,
) -> Result<Resolution, DiffError> {
    let listing = catalog
        .list_channel(&channel.link, channel.search_limit, channel.live_rule, tuning)
        .await?;

    info!(
        channel = %channel.name,
        remote_title = listing.title.as_deref().unwrap_or(""),
        entries = listing.entries.len(),
        "Channel listed"
    );

    let cutoff = channel
        .lookback_days()
        .map(|days| options.now.naive_local() - Duration::days(days));

    let mut pending = Vec::new();
    let mut failures = 0;

    for entry in &listing.entries {
        let title = display_title(entry, options.include_id_in_filename);

        match live_step(channel.live_rule, entry.live_status.as_ref(), !pending.is_empty()) {
            Step::Take => {}
            Step::Skip => {
                debug!(channel = %channel.name, item = %entry.id, "Skipping live item");
                continue;
            }
            Step::Stop => {
                debug!(channel = %channel.name, item = %entry.id, "No further live items wanted");
                break;
            }
        }

        if is_present(presence, entry, &title) {
            debug!(channel = %channel.name, item = %entry.id, "Already in library");
            continue;
        }

        let details = match catalog.item_details(&entry.url, tuning).await {
            Ok(details) => details,
            Err(e) => {
                failures += 1;
                error!(channel = %channel.name, item = %entry.id, error = %e, "Failed to get item details");
                if failures >= MAX_CONSECUTIVE_ITEM_FAILURES {
                    error!(channel = %channel.name, "Too many detail failures in succession, aborting");
                    return Err(DiffError::TooManyFailures(failures));
                }
                continue;
            }
        };
        failures = 0;

        if let Some(cutoff) = cutoff {
            if details.upload_date.and_time(NaiveTime::MIN) < cutoff {
                info!(channel = %channel.name, item = %entry.id, cutoff = %cutoff, "Older than lookback window, stopping");
                break;
            }
        }

        let age_hours = (options.now.timestamp() - details.timestamp) as f64 / 3600.0;
        if entry.live_status.is_none() && age_hours < options.defer_hours {
            info!(
                channel = %channel.name,
                item = %entry.id,
                age_hours = format!("{:.2}", age_hours),
                "Too recent, deferring"
            );
            continue;
        }

        if !passes_title_filter(channel, &title) {
            debug!(channel = %channel.name, item = %entry.id, filter = %channel.filter_title_text, "Filtered by title");
            continue;
        }

        debug!(channel = %channel.name, item = %entry.id, "Selected for fetch");
        pending.push(PendingItem {
            id: entry.id.clone(),
            title,
            upload_date: details.upload_date,
            url: entry.url.clone(),
            channel_title: listing.title.clone(),
        });
    }

    Ok(Resolution {
        channel_title: listing.title.clone(),
        listed: listing.entries.len(),
        pending,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ChannelListing, LiveStatus};
    use crate::testing::{fixtures, MockCatalog};

    const LINK: &str = "https://www.youtube.com/@Test";

    fn options(now: DateTime<Local>) -> DiffOptions {
        DiffOptions {
            defer_hours: 0.0,
            include_id_in_filename: false,
            now,
        }
    }

    fn channel() -> Channel {
        let mut channel = fixtures::channel(1, "Test", LINK);
        channel.dl_days = -1;
        channel
    }

    async fn catalog_with(entries: Vec<RemoteEntry>, now: DateTime<Local>, days_old: &[i64]) -> MockCatalog {
        let catalog = MockCatalog::new();
        for (entry, days) in entries.iter().zip(days_old) {
            catalog
                .set_details(&entry.url, fixtures::details_days_ago(now, *days))
                .await;
        }
        catalog
            .set_listing(LINK, fixtures::listing("Test Channel", entries))
            .await;
        catalog
    }

    async fn run(
        channel: &Channel,
        presence: &LocalPresence,
        catalog: &MockCatalog,
        opts: &DiffOptions,
    ) -> Result<Resolution, DiffError> {
        resolve(channel, presence, catalog, &FetchTuning::default(), opts).await
    }

    fn ids(resolution: &Resolution) -> Vec<&str> {
        resolution.pending.iter().map(|p| p.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_lookback_stops_at_first_old_item() {
        let now = Local::now();
        let entries: Vec<_> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|id| fixtures::entry(id, &format!("Item {}", id)))
            .collect();
        let catalog = catalog_with(entries, now, &[1, 3, 6, 10, 14]).await;

        let mut channel = channel();
        channel.dl_days = 7;

        let resolution = run(&channel, &LocalPresence::default(), &catalog, &options(now))
            .await
            .unwrap();

        assert_eq!(ids(&resolution), vec!["a", "b", "c"]);
        assert_eq!(resolution.listed, 5);
        // Item "e" is never looked up
        assert_eq!(catalog.recorded_details().await.len(), 4);
    }

    #[tokio::test]
    async fn test_present_items_are_skipped() {
        let now = Local::now();
        let entries = vec![
            fixtures::entry("aaaaaaaaaaa", "By Id"),
            fixtures::entry("bbbbbbbbbbb", "By Name"),
            fixtures::entry("ccccccccccc", "What? A: title"),
            fixtures::entry("ddddddddddd", "New"),
        ];
        let catalog = catalog_with(entries, now, &[1, 1, 1, 1]).await;

        let mut presence = LocalPresence::default();
        presence.ids.insert("aaaaaaaaaaa".to_string());
        presence.names.insert("By Name".to_string());
        presence.names.insert("What A title".to_string());

        let resolution = run(&channel(), &presence, &catalog, &options(now))
            .await
            .unwrap();

        assert_eq!(ids(&resolution), vec!["ddddddddddd"]);
    }

    #[tokio::test]
    async fn test_id_suffix_in_title() {
        let now = Local::now();
        let catalog = catalog_with(vec![fixtures::entry("xyz", "Title")], now, &[1]).await;
        let mut opts = options(now);
        opts.include_id_in_filename = true;

        let resolution = run(&channel(), &LocalPresence::default(), &catalog, &opts).await
            .unwrap();

        assert_eq!(resolution.pending[0].title, "Title [xyz]");
        assert_eq!(resolution.pending[0].channel_title.as_deref(), Some("Test Channel"));
    }

    #[tokio::test]
    async fn test_live_rule_ignore_skips_any_status() {
        let now = Local::now();
        let entries = vec![
            fixtures::live_entry("a", LiveStatus::WasLive),
            fixtures::entry("b", "Plain"),
            fixtures::live_entry("c", LiveStatus::NotLive),
            fixtures::live_entry("d", LiveStatus::IsLive),
        ];
        let catalog = catalog_with(entries, now, &[1, 1, 1, 1]).await;

        let resolution = run(&channel(), &LocalPresence::default(), &catalog, &options(now)).await
            .unwrap();

        assert_eq!(ids(&resolution), vec!["b"]);
    }

    #[tokio::test]
    async fn test_live_rule_only_takes_first_active_stream() {
        let now = Local::now();
        let entries = vec![
            fixtures::live_entry("up", LiveStatus::IsUpcoming),
            fixtures::live_entry("live1", LiveStatus::IsLive),
            fixtures::live_entry("live2", LiveStatus::IsLive),
        ];
        let catalog = catalog_with(entries, now, &[0, 0, 0]).await;

        let mut channel = channel();
        channel.live_rule = LiveRule::Only;

        let resolution = run(&channel, &LocalPresence::default(), &catalog, &options(now)).await
            .unwrap();

        assert_eq!(ids(&resolution), vec!["live1"]);
    }

    #[tokio::test]
    async fn test_live_rule_only_stops_at_inactive() {
        let now = Local::now();
        let entries = vec![
            fixtures::live_entry("old", LiveStatus::WasLive),
            fixtures::live_entry("live", LiveStatus::IsLive),
        ];
        let catalog = catalog_with(entries, now, &[0, 0]).await;

        let mut channel = channel();
        channel.live_rule = LiveRule::Only;

        let resolution = run(&channel, &LocalPresence::default(), &catalog, &options(now)).await
            .unwrap();

        assert!(resolution.pending.is_empty());
    }

    #[tokio::test]
    async fn test_defer_applies_to_non_live_only() {
        let now = Local::now();
        let entries = vec![
            fixtures::entry("fresh", "Fresh"),
            fixtures::live_entry("stream", LiveStatus::PostLive),
        ];
        let catalog = catalog_with(entries, now, &[0, 0]).await;

        let mut channel = channel();
        channel.live_rule = LiveRule::Include;
        let mut opts = options(now);
        opts.defer_hours = 6.0;

        let resolution = run(&channel, &LocalPresence::default(), &catalog, &opts).await
            .unwrap();

        assert_eq!(ids(&resolution), vec!["stream"]);
    }

    #[tokio::test]
    async fn test_title_filter_include_and_negate() {
        let now = Local::now();
        let entries = vec![
            fixtures::entry("a", "Weekly PODCAST 1"),
            fixtures::entry("b", "Short clip"),
        ];
        let catalog = catalog_with(entries.clone(), now, &[1, 1]).await;

        let mut channel = channel();
        channel.filter_title_text = "podcast".to_string();
        let resolution = run(&channel, &LocalPresence::default(), &catalog, &options(now)).await
            .unwrap();
        assert_eq!(ids(&resolution), vec!["a"]);

        channel.negate_filter = true;
        let resolution = run(&channel, &LocalPresence::default(), &catalog, &options(now)).await
            .unwrap();
        assert_eq!(ids(&resolution), vec!["b"]);
    }

    #[tokio::test]
    async fn test_consecutive_detail_failures_abort() {
        let now = Local::now();
        let entries: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| fixtures::entry(id, id))
            .collect();
        // Only "d" has details
        let catalog = MockCatalog::new();
        catalog
            .set_details(&entries[3].url, fixtures::details_days_ago(now, 1))
            .await;
        catalog.set_listing(LINK, fixtures::listing("T", entries)).await;

        let result = run(&channel(), &LocalPresence::default(), &catalog, &options(now)).await;
        assert!(matches!(result, Err(DiffError::TooManyFailures(3))));
    }

    #[tokio::test]
    async fn test_successful_lookup_resets_failure_streak() {
        let now = Local::now();
        let entries: Vec<_> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|id| fixtures::entry(id, id))
            .collect();
        let catalog = MockCatalog::new();
        for idx in [2, 4] {
            catalog
                .set_details(&entries[idx].url, fixtures::details_days_ago(now, 1))
                .await;
        }
        catalog.set_listing(LINK, fixtures::listing("T", entries)).await;

        let resolution = run(&channel(), &LocalPresence::default(), &catalog, &options(now)).await
            .unwrap();
        assert_eq!(ids(&resolution), vec!["c", "e"]);
    }

    #[tokio::test]
    async fn test_listing_failure() {
        let catalog = MockCatalog::new();
        catalog.fail_listing(LINK).await;

        let result = resolve(
            &channel(),
            &LocalPresence::default(),
            &catalog,
            &FetchTuning::default(),
            &options(Local::now()),
        )
        .await;
        assert!(matches!(result, Err(DiffError::Listing(_))));
    }

    #[tokio::test]
    async fn test_empty_listing_is_success() {
        let catalog = MockCatalog::new();
        catalog.set_listing(LINK, ChannelListing::default()).await;

        let resolution = resolve(
            &channel(),
            &LocalPresence::default(),
            &catalog,
            &FetchTuning::default(),
            &options(Local::now()),
        )
        .await
        .unwrap();
        assert!(resolution.pending.is_empty());
        assert_eq!(resolution.listed, 0);
    }
}
