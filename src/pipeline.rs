//! Pipeline orchestration: fetch, extract, filter, aggregate, clean up

use crate::channel::{ChannelClient, ChannelFetcher, HttpChannelClient};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::metadata::{MetadataExtractor, resolve_extractor};
use crate::storage::ScopedStorage;
use crate::types::{
    AnalysisReport, AuthorStatistic, Event, FetchedFile, MetadataRecord, RetainedRecord,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Counts retained records per author
///
/// Rows are ordered by descending count; equal counts are ordered by author
/// name so the output is stable.
pub fn aggregate_authors(records: &[RetainedRecord]) -> Vec<AuthorStatistic> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.author.as_str()).or_default() += 1;
    }

    let mut statistics: Vec<AuthorStatistic> = counts
        .into_iter()
        .map(|(author, count)| AuthorStatistic {
            author: author.to_string(),
            count,
        })
        .collect();
    statistics.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.author.cmp(&b.author)));
    statistics
}

/// Scans a channel's documents and tallies their authors
///
/// One instance can run several analyses; each run gets its own scoped
/// storage lifetime. Cancelling [`cancel_token`](MetaSniffer::cancel_token)
/// aborts the current and any later run.
///
/// # Example
///
/// ```no_run
/// use meta_sniffer::{Config, MetaSniffer};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let sniffer = MetaSniffer::from_config(Config::from_env()?)?;
/// for row in sniffer.run("some_channel", None, None).await? {
///     println!("{}: {}", row.author, row.count);
/// }
/// # Ok(())
/// # }
/// ```
pub struct MetaSniffer {
    config: Config,
    client: Arc<dyn ChannelClient>,
    extractor: Arc<dyn MetadataExtractor>,
    storage: ScopedStorage,
    event_tx: broadcast::Sender<Event>,
    cancel_token: CancellationToken,
}

impl MetaSniffer {
    /// Assemble a pipeline from explicit collaborators
    pub fn new(
        config: Config,
        client: Arc<dyn ChannelClient>,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let storage = ScopedStorage::new(config.storage.download_dir.clone());
        Self {
            config,
            client,
            extractor,
            storage,
            event_tx,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Build the HTTP channel client and resolve exiftool from configuration
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let client = Arc::new(HttpChannelClient::new(&config.channel)?);
        let extractor = resolve_extractor(&config.tools);
        info!(
            client = client.name(),
            extractor = extractor.name(),
            download_dir = ?config.storage.download_dir,
            "meta-sniffer initialized"
        );
        Ok(Self::new(config, client, extractor))
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token that cancels runs of this instance
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Scoped storage directory used by runs
    pub fn storage_dir(&self) -> &Path {
        self.storage.path()
    }

    /// Analyze a channel and return author statistics, descending by count
    pub async fn run(
        &self,
        channel: &str,
        before: Option<DateTime<Utc>>,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<AuthorStatistic>> {
        Ok(self.run_with_report(channel, before, after).await?.statistics)
    }

    /// Analyze a channel and return the full report
    ///
    /// Scoped storage is released whether the analysis succeeds, fails or is
    /// cancelled. A failed release is logged and does not change the result.
    pub async fn run_with_report(
        &self,
        channel: &str,
        before: Option<DateTime<Utc>>,
        after: Option<DateTime<Utc>>,
    ) -> Result<AnalysisReport> {
        let span = tracing::info_span!("analyze", channel);
        async move {
            let guard = self.storage.acquire().await?;
            let result = self.analyze(channel, guard.path(), before, after).await;
            if let Err(e) = guard.release().await {
                error!(error = %e, "error cleaning up scoped storage");
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn analyze(
        &self,
        channel: &str,
        storage_dir: &Path,
        before: Option<DateTime<Utc>>,
        after: Option<DateTime<Utc>>,
    ) -> Result<AnalysisReport> {
        let fetcher = ChannelFetcher::new(Arc::clone(&self.client), self.config.filter.clone())
            .with_events(self.event_tx.clone())
            .with_cancel_token(self.cancel_token.clone());

        let outcomes = fetcher
            .fetch_outcomes(channel, storage_dir, before, after)
            .await;
        if self.cancel_token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut files = Vec::with_capacity(outcomes.len());
        let mut fetch_failures = 0;
        for outcome in outcomes {
            match outcome {
                Ok(file) => files.push(file),
                Err(e) if e.is_recoverable() => fetch_failures += 1,
                Err(e) => return Err(e),
            }
        }

        let files_fetched = files.len();
        let extracted = self.extract_all(files).await?;

        let mut records = Vec::new();
        let mut extraction_failures = 0;
        let mut records_dropped = 0;
        for (file, outcome) in extracted {
            match outcome {
                Ok(record) => match RetainedRecord::from_metadata(&file, &record) {
                    Some(retained) => records.push(retained),
                    None => {
                        debug!(file = %file.file_name, "no author metadata");
                        records_dropped += 1;
                    }
                },
                Err(e) if e.is_recoverable() => {
                    warn!(file = ?file.path, error = %e, "error extracting metadata");
                    extraction_failures += 1;
                    records_dropped += 1;
                }
                Err(e) => {
                    error!(file = ?file.path, error = %e, "metadata extraction aborted the run");
                    return Err(e);
                }
            }
        }
        records.sort_by(|a, b| a.author.cmp(&b.author).then_with(|| a.file.cmp(&b.file)));

        let statistics = aggregate_authors(&records);
        info!(
            files = files_fetched,
            retained = records.len(),
            dropped = records_dropped,
            authors = statistics.len(),
            "analysis complete"
        );
        self.event_tx
            .send(Event::AnalysisComplete {
                authors: statistics.len(),
                records: records.len(),
            })
            .ok();

        Ok(AnalysisReport {
            channel: channel.to_string(),
            statistics,
            records,
            files_fetched,
            fetch_failures,
            extraction_failures,
            records_dropped,
        })
    }

    /// Run the extractor on every file with bounded parallelism
    ///
    /// Returns only once every extraction has finished (or the run was cancelled).
    async fn extract_all(
        &self,
        files: Vec<FetchedFile>,
    ) -> Result<Vec<(FetchedFile, Result<MetadataRecord>)>> {
        let total = files.len();
        let concurrency = self.config.extraction.max_concurrent.max(1);
        info!(total, concurrency, "extracting metadata");

        let mut pending = stream::iter(files)
            .map(|file| {
                let extractor = Arc::clone(&self.extractor);
                async move {
                    let outcome = extractor.inspect(&file.path).await;
                    (file, outcome)
                }
            })
            .buffer_unordered(concurrency);

        let mut results = Vec::with_capacity(total);
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => return Err(Error::Cancelled),
                next = pending.next() => next,
            };
            let Some((file, outcome)) = next else {
                break;
            };

            let author = outcome
                .as_ref()
                .ok()
                .and_then(|record| record.known_author())
                .map(str::to_string);
            results.push((file, outcome));
            self.event_tx
                .send(Event::MetadataExtracted {
                    done: results.len(),
                    total,
                    author,
                })
                .ok();
        }

        Ok(results)
    }
}
