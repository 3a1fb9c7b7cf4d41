//! Attachment filtering by file type and message date

use crate::config::FilterConfig;
use crate::types::ChannelMessage;
use crate::utils::sanitize_file_name;
use chrono::{DateTime, Utc};

/// Why a message was not selected for download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The message has no attached file
    NoAttachment,
    /// The attachment has no usable file name
    NoFileName,
    /// The file name does not end in the target extension
    WrongExtension,
    /// The declared MIME type is not the target type
    WrongMimeType,
    /// The message is not strictly before the `before` bound
    NotBefore,
    /// The message is not strictly after the `after` bound
    NotAfter,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Rejection::NoAttachment => "no attached file",
            Rejection::NoFileName => "attachment has no file name",
            Rejection::WrongExtension => "wrong file extension",
            Rejection::WrongMimeType => "wrong MIME type",
            Rejection::NotBefore => "not before the --before date",
            Rejection::NotAfter => "not after the --after date",
        };
        f.write_str(reason)
    }
}

/// Predicate selecting document attachments inside a date window
///
/// Both date bounds are exclusive.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use meta_sniffer::channel::AttachmentFilter;
///
/// let filter = AttachmentFilter::new(".pdf", "application/pdf")
///     .with_before(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
/// assert!(filter.has_date_bounds());
/// ```
#[derive(Debug, Clone)]
pub struct AttachmentFilter {
    extension: String,
    mime_type: String,
    before: Option<DateTime<Utc>>,
    after: Option<DateTime<Utc>>,
}

impl AttachmentFilter {
    /// Create a filter for one extension and MIME type with no date bounds
    pub fn new(extension: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            mime_type: mime_type.into(),
            before: None,
            after: None,
        }
    }

    /// Create a filter from configuration
    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(config.extension.clone(), config.mime_type.clone())
    }

    /// Only accept messages posted strictly before `instant`
    pub fn with_before(mut self, instant: DateTime<Utc>) -> Self {
        self.before = Some(instant);
        self
    }

    /// Only accept messages posted strictly after `instant`
    pub fn with_after(mut self, instant: DateTime<Utc>) -> Self {
        self.after = Some(instant);
        self
    }

    /// Apply optional bounds
    pub fn with_bounds(
        mut self,
        before: Option<DateTime<Utc>>,
        after: Option<DateTime<Utc>>,
    ) -> Self {
        self.before = before;
        self.after = after;
        self
    }

    /// Whether any date bound is set
    pub fn has_date_bounds(&self) -> bool {
        self.before.is_some() || self.after.is_some()
    }

    /// The first reason `message` fails the filter, or `None` if it passes
    pub fn rejection_reason(&self, message: &ChannelMessage) -> Option<Rejection> {
        if message.file.is_none() {
            return Some(Rejection::NoAttachment);
        }
        let Some(name) = message.file_name().and_then(sanitize_file_name) else {
            return Some(Rejection::NoFileName);
        };
        if !name.ends_with(&self.extension) {
            return Some(Rejection::WrongExtension);
        }
        if message.mime_type() != Some(self.mime_type.as_str()) {
            return Some(Rejection::WrongMimeType);
        }
        if let Some(before) = self.before
            && message.date >= before
        {
            return Some(Rejection::NotBefore);
        }
        if let Some(after) = self.after
            && message.date <= after
        {
            return Some(Rejection::NotAfter);
        }
        None
    }

    /// Whether `message` should be downloaded
    pub fn matches(&self, message: &ChannelMessage) -> bool {
        self.rejection_reason(message).is_none()
    }

    /// Short description for logging
    pub fn description(&self) -> String {
        let fmt = |d: &DateTime<Utc>| d.format("%Y-%m-%d %H:%M:%S").to_string();
        match (&self.after, &self.before) {
            (Some(after), Some(before)) => format!(
                "{} ({}) after={} before={}",
                self.extension,
                self.mime_type,
                fmt(after),
                fmt(before)
            ),
            (Some(after), None) => {
                format!("{} ({}) after={}", self.extension, self.mime_type, fmt(after))
            }
            (None, Some(before)) => {
                format!("{} ({}) before={}", self.extension, self.mime_type, fmt(before))
            }
            (None, None) => format!("{} ({})", self.extension, self.mime_type),
        }
    }
}
