//! Download of matching channel attachments into scoped storage

use super::filter::AttachmentFilter;
use super::traits::ChannelClient;
use crate::config::FilterConfig;
use crate::error::{ChannelError, Error, Result};
use crate::types::{ChannelMessage, Event, FetchedFile};
use crate::utils::sanitize_file_name;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Iterates a channel and downloads every attachment passing the filter
///
/// Downloads run one after another in iteration order. Attachments sharing a
/// file name are written to the same path, so the message iterated last wins;
/// each successful download still yields its own [`FetchedFile`].
pub struct ChannelFetcher {
    client: Arc<dyn ChannelClient>,
    filter: FilterConfig,
    event_tx: Option<broadcast::Sender<Event>>,
    cancel_token: CancellationToken,
}

impl ChannelFetcher {
    /// Create a fetcher over a channel client
    pub fn new(client: Arc<dyn ChannelClient>, filter: FilterConfig) -> Self {
        Self {
            client,
            filter,
            event_tx: None,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Publish progress events on `event_tx`
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Stop iterating once `cancel_token` is cancelled
    pub fn with_cancel_token(mut self, cancel_token: CancellationToken) -> Self {
        self.cancel_token = cancel_token;
        self
    }

    /// Fetch matching attachments, keeping only the successful downloads
    pub async fn fetch_files(
        &self,
        channel: &str,
        destination: &Path,
        before: Option<DateTime<Utc>>,
        after: Option<DateTime<Utc>>,
    ) -> Vec<FetchedFile> {
        self.fetch_outcomes(channel, destination, before, after)
            .await
            .into_iter()
            .filter_map(Result::ok)
            .collect()
    }

    /// Fetch matching attachments, returning one result per download attempt
    ///
    /// Connection and listing failures are logged and end the call early with
    /// whatever was fetched so far. The session is always torn down exactly once.
    #[tracing::instrument(skip(self, destination), fields(client = self.client.name()))]
    pub async fn fetch_outcomes(
        &self,
        channel: &str,
        destination: &Path,
        before: Option<DateTime<Utc>>,
        after: Option<DateTime<Utc>>,
    ) -> Vec<Result<FetchedFile>> {
        let filter = AttachmentFilter::from_config(&self.filter).with_bounds(before, after);
        let mut outcomes = Vec::new();

        self.emit(Event::FetchStarted {
            channel: channel.to_string(),
        });

        match self.client.connect().await {
            Ok(()) => {
                info!(filter = %filter.description(), "scanning channel");
                if let Err(e) = self
                    .download_matching(channel, destination, &filter, &mut outcomes)
                    .await
                {
                    match e {
                        Error::Cancelled => warn!("channel scan cancelled"),
                        e => error!(error = %e, "error downloading from channel"),
                    }
                }
            }
            Err(e) => error!(error = %e, "error connecting to channel service"),
        }

        if let Err(e) = self.client.disconnect().await {
            warn!(error = %e, "error closing channel session");
        }

        let failures = outcomes.iter().filter(|o| o.is_err()).count();
        let files = outcomes.len() - failures;
        info!(files, failures, "channel scan complete");
        self.emit(Event::FetchComplete { files, failures });

        outcomes
    }

    async fn download_matching(
        &self,
        channel: &str,
        destination: &Path,
        filter: &AttachmentFilter,
        outcomes: &mut Vec<Result<FetchedFile>>,
    ) -> Result<()> {
        tokio::fs::create_dir_all(destination).await?;

        let mut messages = self.client.iter_messages(channel);
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => return Err(Error::Cancelled),
                next = messages.next() => next,
            };
            let Some(message) = next else {
                return Ok(());
            };
            let message = message?;

            if let Some(reason) = filter.rejection_reason(&message) {
                debug!(message_id = message.id.get(), %reason, "skipped message");
                continue;
            }

            let outcome = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => return Err(Error::Cancelled),
                outcome = self.download_one(&message, destination) => outcome,
            };
            outcomes.push(outcome);
        }
    }

    async fn download_one(
        &self,
        message: &ChannelMessage,
        destination: &Path,
    ) -> Result<FetchedFile> {
        let message_id = message.id.get();
        let file_name = message
            .file_name()
            .and_then(sanitize_file_name)
            .ok_or(ChannelError::MissingAttachment { message_id })?;
        let path = destination.join(&file_name);

        info!(message_id, file = %file_name, "downloading attachment");

        match self.client.download_attachment(message, &path).await {
            Ok(()) => {
                self.emit(Event::FileFetched {
                    message_id: message.id,
                    file_name: file_name.clone(),
                });
                Ok(FetchedFile {
                    path,
                    file_name,
                    message_id: message.id,
                })
            }
            Err(e) => {
                error!(message_id, file = %file_name, error = %e, "failed to download attachment");
                self.emit(Event::FetchFailed {
                    message_id: message.id,
                    error: e.to_string(),
                });
                Err(ChannelError::DownloadFailed {
                    message_id,
                    file_name,
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.event_tx {
            tx.send(event).ok();
        }
    }
}
