//! Authorship metadata extraction
//!
//! The core abstraction is the [`MetadataExtractor`] trait. Implementations:
//!
//! - [`CliMetadataExtractor`]: runs the external `exiftool` binary
//! - [`NoOpMetadataExtractor`]: stub used when exiftool is unavailable
//!
//! Raw tool output is normalized by [`normalize_tags`] into a
//! [`MetadataRecord`](crate::types::MetadataRecord) holding at most an author
//! (first non-empty tag of [`AUTHOR_FIELDS`]) and a creation date.

mod cli;
mod noop;
mod parser;
mod traits;

pub use cli::CliMetadataExtractor;
pub use noop::NoOpMetadataExtractor;
pub use parser::{AUTHOR_FIELDS, CREATION_DATE_FIELD, normalize_tags, parse_exiftool_output};
pub use traits::MetadataExtractor;

use crate::config::ToolsConfig;
use std::sync::Arc;

/// Pick an extractor according to the tool configuration
///
/// Explicit `exiftool_path` first, then a PATH lookup (if `search_path`),
/// otherwise the no-op extractor.
pub fn resolve_extractor(tools: &ToolsConfig) -> Arc<dyn MetadataExtractor> {
    let extractor: Arc<dyn MetadataExtractor> = if let Some(ref path) = tools.exiftool_path {
        Arc::new(CliMetadataExtractor::new(path.clone()))
    } else if tools.search_path {
        CliMetadataExtractor::from_path()
            .map(|e| Arc::new(e) as Arc<dyn MetadataExtractor>)
            .unwrap_or_else(|| Arc::new(NoOpMetadataExtractor))
    } else {
        Arc::new(NoOpMetadataExtractor)
    };

    if extractor.name() == "noop" {
        tracing::warn!("exiftool not found, no metadata will be extracted");
    } else {
        tracing::info!(extractor = extractor.name(), "metadata extractor initialized");
    }

    extractor
}
