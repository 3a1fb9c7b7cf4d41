//! Normalization of exiftool JSON output

use crate::error::ExtractionError;
use crate::types::MetadataRecord;
use serde_json::{Map, Value};
use std::path::Path;

/// Tags that may carry the author, in priority order
///
/// Producers disagree on where the author goes; the first non-empty tag wins.
pub const AUTHOR_FIELDS: [&str; 7] = [
    "Author", "Creator", "Artist", "By-line", "Writer", "Producer", "Owner",
];

/// Tag carrying the creation date
pub const CREATION_DATE_FIELD: &str = "CreateDate";

/// Parse the stdout of `exiftool -json <file>`
///
/// exiftool prints a JSON array with one object per inspected file; only the
/// first element is used.
pub fn parse_exiftool_output(
    path: &Path,
    stdout: &[u8],
) -> Result<MetadataRecord, ExtractionError> {
    let invalid = |reason: String| ExtractionError::InvalidOutput {
        path: path.to_path_buf(),
        reason,
    };

    let document: Value =
        serde_json::from_slice(stdout).map_err(|e| invalid(format!("not JSON: {e}")))?;

    let first = match document {
        Value::Array(items) => items
            .into_iter()
            .next()
            .ok_or_else(|| invalid("empty result array".to_string()))?,
        other => return Err(invalid(format!("expected an array, got {}", kind(&other)))),
    };

    match first {
        Value::Object(tags) => Ok(normalize_tags(&tags)),
        other => Err(invalid(format!(
            "expected an object per file, got {}",
            kind(&other)
        ))),
    }
}

/// Reduce raw tags to the canonical `{Author, CreationDate}` shape
pub fn normalize_tags(tags: &Map<String, Value>) -> MetadataRecord {
    let author = AUTHOR_FIELDS
        .iter()
        .find_map(|field| tags.get(*field).and_then(tag_text));

    let creation_date = tags.get(CREATION_DATE_FIELD).and_then(tag_text);

    MetadataRecord {
        author,
        creation_date,
    }
}

/// Text of a tag value, or `None` if the value counts as empty
///
/// Strings count when they contain non-whitespace, numbers are rendered as
/// text, and lists (XMP `Creator` is often one) are joined with `", "`.
fn tag_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(tag_text).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Null | Value::Bool(_) | Value::Object(_) => None,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
