//! Error types for meta-sniffer
//!
//! The pipeline distinguishes two kinds of failure:
//! - fatal errors (bad configuration, scoped storage cannot be created, cancellation)
//!   that abort a run
//! - per-item errors (a single download or metadata extraction failing) that are
//!   logged and dropped from the result set
//!
//! [`Error::is_recoverable`] encodes that split so callers can filter per-item
//! results without matching on every variant.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for meta-sniffer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for meta-sniffer
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "TELEGRAM_API_ID")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote channel error (session, listing, download)
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Metadata extraction error
    #[error("metadata extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Scoped storage error
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Operation not supported (missing binary, not implemented, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The run was cancelled before it completed
    #[error("run cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors raised while talking to the remote channel service
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Could not establish a session
    #[error("failed to connect to channel service: {0}")]
    ConnectionFailed(String),

    /// An operation needing a session was called before `connect`
    #[error("not connected to channel service")]
    NotConnected,

    /// The service answered with a non-success HTTP status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// The HTTP status code returned
        status: u16,
        /// The request URL
        url: String,
    },

    /// Iterating the channel history failed
    #[error("failed to list messages in {channel}: {reason}")]
    ListingFailed {
        /// The channel reference being iterated
        channel: String,
        /// The reason listing failed
        reason: String,
    },

    /// Download was requested for a message without an attached file
    #[error("message {message_id} has no attachment")]
    MissingAttachment {
        /// The message ID
        message_id: i64,
    },

    /// Fetching a single attachment failed
    #[error("failed to download {file_name} from message {message_id}: {reason}")]
    DownloadFailed {
        /// The message ID the attachment belongs to
        message_id: i64,
        /// Declared attachment file name
        file_name: String,
        /// The reason the download failed
        reason: String,
    },
}

/// Errors raised while running the metadata tool on one file
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The tool process could not be started
    #[error("failed to launch metadata tool for {path}: {reason}")]
    Launch {
        /// The file being inspected
        path: PathBuf,
        /// The reason the launch failed
        reason: String,
    },

    /// The tool exited with a non-zero status
    #[error("metadata tool failed for {path} (exit code {exit_code:?}): {stderr}")]
    ToolFailed {
        /// The file being inspected
        path: PathBuf,
        /// Exit code, if the process was not killed by a signal
        exit_code: Option<i32>,
        /// Trimmed standard error output
        stderr: String,
    },

    /// The tool succeeded but its output could not be interpreted
    #[error("unparseable metadata output for {path}: {reason}")]
    InvalidOutput {
        /// The file being inspected
        path: PathBuf,
        /// What was wrong with the output
        reason: String,
    },
}

/// Scoped storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// The working directory could not be created
    #[error("failed to create storage directory {path}: {reason}")]
    CreateFailed {
        /// The directory path
        path: PathBuf,
        /// The reason creation failed
        reason: String,
    },

    /// The working directory could not be emptied (non-fatal, logged)
    #[error("failed to release storage directory {path}: {reason}")]
    ReleaseFailed {
        /// The directory path
        path: PathBuf,
        /// The reason release failed
        reason: String,
    },
}

impl Error {
    /// Create a configuration error for a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error only affects a single item of the run
    ///
    /// Recoverable errors are logged and the item is dropped; everything else
    /// aborts the operation that produced it.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Channel(ChannelError::DownloadFailed { .. })
            | Error::Channel(ChannelError::MissingAttachment { .. })
            | Error::Channel(ChannelError::HttpStatus { .. })
            | Error::Extraction(_)
            | Error::NotSupported(_)
            | Error::Io(_)
            | Error::Network(_)
            | Error::Serialization(_) => true,

            Error::Config { .. }
            | Error::Storage(_)
            | Error::Cancelled
            | Error::Channel(ChannelError::ConnectionFailed(_))
            | Error::Channel(ChannelError::NotConnected)
            | Error::Channel(ChannelError::ListingFailed { .. })
            | Error::Other(_) => false,
        }
    }
}
