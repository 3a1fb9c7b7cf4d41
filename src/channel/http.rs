//! JSON gateway client for the remote channel service
//!
//! Endpoints (relative to `base_url`):
//!
//! | Operation | Request | Response |
//! |---|---|---|
//! | connect | `POST /sessions` `{api_id, api_hash, session_name}` | `{"token": "..."}` |
//! | list | `GET /channels/{channel}/messages?limit=N[&offset_id=ID]` | `{"messages": [...], "next_offset_id": ID or null}` |
//! | download | `GET /channels/{channel}/messages/{id}/file` | raw bytes |
//! | disconnect | `DELETE /sessions/current` | any 2xx |
//!
//! Every request after `connect` carries `Authorization: Bearer <token>`.

use super::traits::ChannelClient;
use crate::config::ChannelConfig;
use crate::error::{ChannelError, Error, Result};
use crate::types::ChannelMessage;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Serialize)]
struct SessionRequest<'a> {
    api_id: &'a str,
    api_hash: &'a str,
    session_name: &'a str,
}

#[derive(Deserialize)]
struct SessionResponse {
    token: String,
}

#[derive(Deserialize)]
struct MessagePage {
    #[serde(default)]
    messages: Vec<ChannelMessage>,
    #[serde(default)]
    next_offset_id: Option<i64>,
}

/// Pagination state for [`HttpChannelClient::iter_messages`]
struct Pager {
    buffer: VecDeque<ChannelMessage>,
    next_offset: Option<i64>,
    /// Cursors already requested; a repeat means the gateway is looping
    seen: HashSet<i64>,
    /// Reported once the buffered messages are drained
    pending_error: Option<Error>,
    exhausted: bool,
}

/// [`ChannelClient`] talking to a JSON gateway over HTTP
pub struct HttpChannelClient {
    http: reqwest::Client,
    base_url: String,
    api_id: String,
    api_hash: String,
    session_name: String,
    page_size: u32,
    token: RwLock<Option<String>>,
}

impl HttpChannelClient {
    /// Build a client from channel configuration
    pub fn new(config: &ChannelConfig) -> Result<Self> {
        url::Url::parse(&config.base_url).map_err(|e| {
            Error::config(
                format!("invalid gateway URL '{}': {e}", config.base_url),
                "base_url",
            )
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                ChannelError::ConnectionFailed(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_id: config.api_id.clone(),
            api_hash: config.api_hash.clone(),
            session_name: config.session_name.clone(),
            page_size: config.page_size.max(1),
            token: RwLock::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn channel_endpoint(&self, channel: &str, rest: &str) -> String {
        self.endpoint(&format!(
            "channels/{}/{}",
            urlencoding::encode(channel),
            rest
        ))
    }

    async fn bearer(&self) -> Result<String> {
        self.token
            .read()
            .await
            .as_ref()
            .map(|token| format!("Bearer {token}"))
            .ok_or(Error::Channel(ChannelError::NotConnected))
    }

    async fn fetch_page(&self, channel: &str, offset_id: Option<i64>) -> Result<MessagePage> {
        let url = self.channel_endpoint(channel, "messages");
        let mut request = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.bearer().await?)
            .query(&[("limit", self.page_size.to_string())]);
        if let Some(offset) = offset_id {
            request = request.query(&[("offset_id", offset.to_string())]);
        }

        let listing_failed = |reason: String| ChannelError::ListingFailed {
            channel: channel.to_string(),
            reason,
        };

        let response = request
            .send()
            .await
            .map_err(|e| listing_failed(e.to_string()))?;
        if !response.status().is_success() {
            return Err(ChannelError::HttpStatus {
                status: response.status().as_u16(),
                url,
            }
            .into());
        }

        let page = response
            .json::<MessagePage>()
            .await
            .map_err(|e| listing_failed(format!("invalid message page: {e}")))?;
        debug!(
            channel,
            messages = page.messages.len(),
            next_offset_id = ?page.next_offset_id,
            "fetched message page"
        );
        Ok(page)
    }

    async fn stream_to_file(&self, response: reqwest::Response, destination: &Path) -> Result<u64> {
        let mut file = tokio::fs::File::create(destination).await?;
        let mut body = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

#[async_trait]
impl ChannelClient for HttpChannelClient {
    async fn connect(&self) -> Result<()> {
        let url = self.endpoint("sessions");
        let response = self
            .http
            .post(&url)
            .json(&SessionRequest {
                api_id: &self.api_id,
                api_hash: &self.api_hash,
                session_name: &self.session_name,
            })
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    format!("timeout connecting to {url}")
                } else {
                    format!("{url}: {e}")
                };
                ChannelError::ConnectionFailed(reason)
            })?;

        if !response.status().is_success() {
            return Err(ChannelError::ConnectionFailed(format!(
                "gateway refused session: HTTP {}",
                response.status()
            ))
            .into());
        }

        let session = response
            .json::<SessionResponse>()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(format!("invalid session response: {e}")))?;

        *self.token.write().await = Some(session.token);
        debug!(session = %self.session_name, "channel session established");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        let Some(token) = self.token.write().await.take() else {
            return Ok(());
        };

        let url = self.endpoint("sessions/current");
        let response = self
            .http
            .delete(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ChannelError::HttpStatus {
                status: response.status().as_u16(),
                url,
            }
            .into());
        }
        debug!(session = %self.session_name, "channel session closed");
        Ok(())
    }

    fn iter_messages<'a>(&'a self, channel: &'a str) -> BoxStream<'a, Result<ChannelMessage>> {
        let pager = Pager {
            buffer: VecDeque::new(),
            next_offset: None,
            seen: HashSet::new(),
            pending_error: None,
            exhausted: false,
        };

        stream::unfold(pager, move |mut pager| async move {
            loop {
                if let Some(message) = pager.buffer.pop_front() {
                    return Some((Ok(message), pager));
                }
                if let Some(e) = pager.pending_error.take() {
                    return Some((Err(e), pager));
                }
                if pager.exhausted {
                    return None;
                }
                match self.fetch_page(channel, pager.next_offset).await {
                    Ok(page) => {
                        pager.exhausted = page.messages.is_empty() || page.next_offset_id.is_none();
                        pager.next_offset = page.next_offset_id;
                        if let Some(cursor) = page.next_offset_id
                            && !pager.seen.insert(cursor)
                        {
                            warn!(channel, cursor, "gateway repeated a page cursor");
                            pager.exhausted = true;
                            pager.pending_error = Some(
                                ChannelError::ListingFailed {
                                    channel: channel.to_string(),
                                    reason: format!("gateway repeated cursor {cursor}"),
                                }
                                .into(),
                            );
                        }
                        pager.buffer.extend(page.messages.into_iter().map(|mut message| {
                            if message.channel.is_empty() {
                                message.channel = channel.to_string();
                            }
                            message
                        }));
                    }
                    Err(e) => {
                        pager.exhausted = true;
                        return Some((Err(e), pager));
                    }
                }
            }
        })
        .boxed()
    }

    async fn download_attachment(
        &self,
        message: &ChannelMessage,
        destination: &Path,
    ) -> Result<()> {
        if message.file.is_none() {
            return Err(ChannelError::MissingAttachment {
                message_id: message.id.get(),
            }
            .into());
        }

        let url = self.channel_endpoint(&message.channel, &format!("messages/{}/file", message.id));
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.bearer().await?)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ChannelError::HttpStatus {
                status: response.status().as_u16(),
                url,
            }
            .into());
        }

        match self.stream_to_file(response, destination).await {
            Ok(bytes) => {
                debug!(message_id = message.id.get(), bytes, file = ?destination, "attachment saved");
                Ok(())
            }
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(destination).await {
                    warn!(file = ?destination, error = %remove_err, "failed to remove partial download");
                }
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "http-gateway"
    }
}
