//! Common test utilities for meta-sniffer integration tests
//!
//! [`FakeChannel`] serves scripted messages and writes each attachment's
//! payload to disk. Payloads are exiftool `-json` documents, so
//! [`JsonFileExtractor`] (or a fake exiftool script) can read them back.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use meta_sniffer::MetaSniffer;
use meta_sniffer::channel::ChannelClient;
use meta_sniffer::config::Config;
use meta_sniffer::error::{ChannelError, Error, ExtractionError, Result};
use meta_sniffer::metadata::{MetadataExtractor, parse_exiftool_output};
use meta_sniffer::types::{Attachment, ChannelMessage, MessageId, MetadataRecord};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// Payload that makes [`JsonFileExtractor`] fail like a crashing exiftool
pub const BROKEN_PAYLOAD: &str = "not exiftool output";

/// Noon on the given day of March 2024, UTC
pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, 12, 0, 0).unwrap()
}

/// exiftool output for a document with the given tags
pub fn exif(tags: serde_json::Value) -> String {
    let mut object = tags.as_object().cloned().unwrap_or_default();
    object.insert("SourceFile".into(), json!("ignored"));
    serde_json::Value::Array(vec![serde_json::Value::Object(object)]).to_string()
}

/// One scripted channel message
#[derive(Clone)]
pub struct FakeMessage {
    pub message: ChannelMessage,
    pub payload: String,
}

/// PDF attachment posted on `date` whose metadata is `tags`
pub fn pdf(id: i64, name: &str, date: DateTime<Utc>, tags: serde_json::Value) -> FakeMessage {
    attachment(id, name, "application/pdf", date, exif(tags))
}

/// Arbitrary attachment with a raw payload
pub fn attachment(
    id: i64,
    name: &str,
    mime: &str,
    date: DateTime<Utc>,
    payload: String,
) -> FakeMessage {
    FakeMessage {
        message: ChannelMessage {
            id: MessageId(id),
            channel: "docs".into(),
            date,
            file: Some(Attachment {
                name: Some(name.to_string()),
                mime_type: Some(mime.to_string()),
                size: Some(payload.len() as u64),
            }),
        },
        payload,
    }
}

/// Text-only message
pub fn text(id: i64, date: DateTime<Utc>) -> FakeMessage {
    FakeMessage {
        message: ChannelMessage {
            id: MessageId(id),
            channel: "docs".into(),
            date,
            file: None,
        },
        payload: String::new(),
    }
}

/// In-memory channel
#[derive(Default)]
pub struct FakeChannel {
    pub messages: Vec<FakeMessage>,
    pub refuse_connect: bool,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub downloads: Mutex<Vec<i64>>,
    /// Block every download on this token after the payload is written
    pub hold_download: Option<CancellationToken>,
    pub download_started: AtomicUsize,
}

impl FakeChannel {
    pub fn with_messages(messages: Vec<FakeMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn downloaded(&self) -> Vec<i64> {
        self.downloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelClient for FakeChannel {
    async fn connect(&self) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse_connect {
            return Err(ChannelError::ConnectionFailed("invalid api hash".into()).into());
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn iter_messages<'a>(&'a self, _channel: &'a str) -> BoxStream<'a, Result<ChannelMessage>> {
        stream::iter(self.messages.iter().map(|m| Ok(m.message.clone()))).boxed()
    }

    async fn download_attachment(
        &self,
        message: &ChannelMessage,
        destination: &Path,
    ) -> Result<()> {
        let fake = self
            .messages
            .iter()
            .find(|m| m.message.id == message.id)
            .ok_or(ChannelError::MissingAttachment {
                message_id: message.id.get(),
            })?;
        self.downloads.lock().unwrap().push(message.id.get());
        tokio::fs::write(destination, &fake.payload).await?;
        self.download_started.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.hold_download {
            token.cancelled().await;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Extractor that parses the file content as exiftool JSON output
///
/// Records every path it was asked about together with whether the file
/// existed at that moment.
#[derive(Default)]
pub struct JsonFileExtractor {
    pub seen: Mutex<Vec<(PathBuf, bool)>>,
    /// Block on this token before reading, if set
    pub hold_until: Option<CancellationToken>,
    pub started: AtomicUsize,
    /// Called with the path once its content has been read
    pub after_read: Option<Box<dyn Fn(&Path) + Send + Sync>>,
    /// Returned instead of reading the file, if set
    pub fail_with: Option<fn() -> Error>,
}

#[async_trait]
impl MetadataExtractor for JsonFileExtractor {
    async fn inspect(&self, path: &Path) -> Result<MetadataRecord> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((path.to_path_buf(), path.exists()));

        if let Some(token) = &self.hold_until {
            token.cancelled().await;
        }

        if let Some(fail) = self.fail_with {
            return Err(fail());
        }

        let bytes = tokio::fs::read(path).await?;
        if let Some(hook) = &self.after_read {
            hook(path);
        }
        if bytes == BROKEN_PAYLOAD.as_bytes() {
            return Err(ExtractionError::ToolFailed {
                path: path.to_path_buf(),
                exit_code: Some(1),
                stderr: "Error: File format error".into(),
            }
            .into());
        }
        Ok(parse_exiftool_output(path, &bytes)?)
    }

    fn name(&self) -> &'static str {
        "json-file"
    }
}

/// Configuration whose scoped storage lives under `root`
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.channel.api_id = "12345".into();
    config.channel.api_hash = "0123456789abcdef".into();
    config.storage.download_dir = root.join("downloads");
    config
}

/// Pipeline over a fake channel and the JSON file extractor
pub fn sniffer(
    root: &Path,
    channel: Arc<FakeChannel>,
    extractor: Arc<JsonFileExtractor>,
) -> MetaSniffer {
    MetaSniffer::new(test_config(root), channel, extractor)
}

/// Names of the entries left in a directory
pub fn dir_entries(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// Map author → count for easy comparison
pub fn as_map(stats: &[meta_sniffer::AuthorStatistic]) -> HashMap<String, usize> {
    stats.iter().map(|s| (s.author.clone(), s.count)).collect()
}

/// Whether a run ended through cancellation
pub fn is_cancelled(err: &Error) -> bool {
    matches!(err, Error::Cancelled)
}
