//! End-to-end `poll` pipeline: fetch → classify → ingest → snapshot → render.

use std::path::PathBuf;
use std::time::Instant;

use tracing::{info, instrument, warn};
use url::Url;

use skywatch_extract::{AirportRegistry, Classifier};
use skywatch_feed::{FeedClient, FeedItem};
use skywatch_shared::{ExtractConfig, FeedConfig, Result, SkywatchError};
use skywatch_site::{RenderResult, SiteConfig};
use skywatch_storage::Storage;

use crate::ingest;

/// Database file name under the data directory.
const DB_FILE_NAME: &str = "skywatch.db";

/// Configuration for the `poll` pipeline.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Feed source settings.
    pub feed: FeedConfig,
    /// Extraction pattern extensions.
    pub extract: ExtractConfig,
    /// Directory for the database and `status.json`.
    pub data_dir: PathBuf,
    /// Directory the rendered site is written to.
    pub site_dir: PathBuf,
    /// Optional directory of user templates.
    pub templates_dir: Option<PathBuf>,
    /// Tool version string.
    pub tool_version: String,
}

impl PollConfig {
    fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    fn site_config(&self) -> SiteConfig {
        SiteConfig {
            site_dir: self.site_dir.clone(),
            templates_dir: self.templates_dir.clone(),
            version: self.tool_version.clone(),
        }
    }
}

/// Result of the `poll` pipeline.
#[derive(Debug)]
pub struct PollResult {
    /// Entries offered by the feed this run.
    pub entries_fetched: usize,
    /// Entries not previously processed.
    pub entries_new: usize,
    /// Status events written.
    pub events_added: usize,
    /// Airports that received events this run.
    pub airports_updated: usize,
    /// Airports tracked in total after the run.
    pub airports_tracked: usize,
    /// Feed fetch failure, if the run fell back to the stored history.
    pub fetch_error: Option<String>,
    /// Directory the site was rendered to.
    pub site_dir: PathBuf,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, result: &PollResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &PollResult) {}
}

/// Run one poll: fetch the feed, apply new entries, and re-render the site.
///
/// A feed failure does not fail the run — the site is re-rendered from the
/// stored history and the error is carried in [`PollResult::fetch_error`].
#[instrument(skip_all, fields(feed_url = %config.feed.url))]
pub async fn poll(config: &PollConfig, progress: &dyn ProgressReporter) -> Result<PollResult> {
    let start = Instant::now();

    progress.phase("Opening storage");
    let storage = Storage::open(&config.db_path()).await?;
    let run_id = storage.insert_poll_run().await?;

    let feed_url = Url::parse(&config.feed.url)
        .map_err(|e| SkywatchError::config(format!("invalid feed url '{}': {e}", config.feed.url)))?;

    progress.phase("Fetching feed");
    let client = FeedClient::new(&config.feed)?;
    let (items, fetch_error): (Vec<FeedItem>, Option<String>) =
        match client.fetch(&feed_url).await {
            Ok(items) => (items, None),
            Err(e) => {
                warn!(error = %e, "feed fetch failed, rendering from stored history");
                (Vec::new(), Some(e.to_string()))
            }
        };

    progress.phase("Processing entries");
    let classifier = Classifier::with_extra_patterns(&config.extract)?;
    let mut registry = AirportRegistry::with_extra(&config.extract)?;
    let stats = ingest::ingest_items(&storage, &classifier, &mut registry, &items).await?;

    progress.phase("Writing snapshot");
    let snapshot = storage.load_snapshot().await?;
    skywatch_site::write_snapshot(&snapshot, &config.data_dir)?;

    progress.phase("Rendering site");
    let rendered = skywatch_site::render_site(&snapshot, &config.site_config())?;

    let run_stats = serde_json::json!({
        "entries_fetched": stats.entries_fetched,
        "entries_new": stats.entries_new,
        "events_added": stats.events_added,
        "airports_updated": stats.airports_updated,
        "fetch_error": fetch_error,
    });
    storage.finish_poll_run(&run_id, &run_stats.to_string()).await?;

    let result = PollResult {
        entries_fetched: stats.entries_fetched,
        entries_new: stats.entries_new,
        events_added: stats.events_added,
        airports_updated: stats.airports_updated,
        airports_tracked: snapshot.len(),
        fetch_error,
        site_dir: rendered.site_dir,
        elapsed: start.elapsed(),
    };

    progress.done(&result);

    info!(
        entries_fetched = result.entries_fetched,
        entries_new = result.entries_new,
        events_added = result.events_added,
        airports_updated = result.airports_updated,
        fetch_failed = result.fetch_error.is_some(),
        elapsed_ms = result.elapsed.as_millis(),
        "poll complete"
    );

    Ok(result)
}

/// Rebuild the site from the stored history without fetching the feed.
#[instrument(skip_all, fields(site_dir = %config.site_dir.display()))]
pub async fn render(config: &PollConfig) -> Result<RenderResult> {
    let storage = Storage::open(&config.db_path()).await?;
    let snapshot = storage.load_snapshot().await?;
    skywatch_site::write_snapshot(&snapshot, &config.data_dir)?;
    skywatch_site::render_site(&snapshot, &config.site_config())
}
