//! Core types for meta-sniffer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sentinel reported when a file carries no creation date
pub const UNKNOWN_CREATION_DATE: &str = "Unknown";

/// Unique identifier for a message within a channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl MessageId {
    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// File attached to a channel message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Declared file name (some media has none)
    #[serde(default)]
    pub name: Option<String>,
    /// Declared MIME type
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Size in bytes, if the service reports it
    #[serde(default)]
    pub size: Option<u64>,
}

/// Read-only view of one message in a remote channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Message ID
    pub id: MessageId,
    /// Channel the message was read from
    #[serde(default)]
    pub channel: String,
    /// When the message was posted
    pub date: DateTime<Utc>,
    /// Attached file, if any
    #[serde(default)]
    pub file: Option<Attachment>,
}

impl ChannelMessage {
    /// Declared name of the attached file, if there is an attachment with a name
    pub fn file_name(&self) -> Option<&str> {
        self.file.as_ref().and_then(|f| f.name.as_deref())
    }

    /// Declared MIME type of the attached file
    pub fn mime_type(&self) -> Option<&str> {
        self.file.as_ref().and_then(|f| f.mime_type.as_deref())
    }
}

/// A file downloaded into scoped storage
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedFile {
    /// Local path inside the scoped storage directory
    pub path: PathBuf,
    /// Originating attachment name
    pub file_name: String,
    /// Message the file was attached to
    pub message_id: MessageId,
}

/// Normalized metadata of one file
///
/// At most two fields are populated. An empty record means "no metadata available".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Resolved author
    #[serde(rename = "Author", skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Creation date as reported by the metadata tool
    #[serde(rename = "Creation Date", skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<String>,
}

impl MetadataRecord {
    /// Whether neither field is populated
    pub fn is_empty(&self) -> bool {
        self.author.is_none() && self.creation_date.is_none()
    }

    /// The author, if present and not blank
    pub fn known_author(&self) -> Option<&str> {
        self.author
            .as_deref()
            .map(str::trim)
            .filter(|author| !author.is_empty())
    }

    /// Creation date, or the `"Unknown"` sentinel
    pub fn creation_date_or_unknown(&self) -> &str {
        self.creation_date
            .as_deref()
            .unwrap_or(UNKNOWN_CREATION_DATE)
    }
}

/// A record kept for aggregation (it has a known author)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetainedRecord {
    /// Resolved author
    #[serde(rename = "Author")]
    pub author: String,
    /// Originating file name
    #[serde(rename = "File")]
    pub file: String,
    /// Creation date, `"Unknown"` when absent
    #[serde(rename = "Creation Date")]
    pub creation_date: String,
}

impl RetainedRecord {
    /// Build a retained record from a file and its metadata
    ///
    /// Returns `None` when the record has no known author.
    pub fn from_metadata(file: &FetchedFile, record: &MetadataRecord) -> Option<Self> {
        let author = record.known_author()?;
        Some(Self {
            author: author.to_string(),
            file: file.file_name.clone(),
            creation_date: record.creation_date_or_unknown().to_string(),
        })
    }
}

/// Number of retained files attributed to one author
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorStatistic {
    /// Author name
    #[serde(rename = "Author")]
    pub author: String,
    /// Number of files (always >= 1)
    #[serde(rename = "Count")]
    pub count: usize,
}

/// Full outcome of one analysis run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Channel that was analyzed
    pub channel: String,
    /// Author statistics, descending by count
    pub statistics: Vec<AuthorStatistic>,
    /// Records that contributed to the statistics
    pub records: Vec<RetainedRecord>,
    /// Files successfully downloaded
    pub files_fetched: usize,
    /// Matching attachments whose download failed
    pub fetch_failures: usize,
    /// Files whose metadata could not be read at all
    pub extraction_failures: usize,
    /// Files dropped because no author was found (includes extraction failures)
    pub records_dropped: usize,
}

impl AnalysisReport {
    /// Number of records retained for aggregation
    pub fn records_retained(&self) -> usize {
        self.records.len()
    }

    /// Whether the run produced no statistics
    pub fn is_empty(&self) -> bool {
        self.statistics.is_empty()
    }
}

/// Event emitted while a run progresses
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Iteration of the channel started
    FetchStarted {
        /// Channel reference
        channel: String,
    },

    /// An attachment was saved to scoped storage
    FileFetched {
        /// Message ID
        message_id: MessageId,
        /// Attachment name
        file_name: String,
    },

    /// A matching attachment could not be downloaded
    FetchFailed {
        /// Message ID
        message_id: MessageId,
        /// Error message
        error: String,
    },

    /// Iteration finished
    FetchComplete {
        /// Number of files fetched
        files: usize,
        /// Number of failed downloads
        failures: usize,
    },

    /// One file went through metadata extraction
    MetadataExtracted {
        /// Files processed so far
        done: usize,
        /// Files to process in total
        total: usize,
        /// Author found for this file, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        author: Option<String>,
    },

    /// Statistics were computed
    AnalysisComplete {
        /// Number of distinct authors
        authors: usize,
        /// Number of retained records
        records: usize,
    },
}
