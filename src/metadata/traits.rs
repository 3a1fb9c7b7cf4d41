//! Trait for metadata extraction

use crate::types::MetadataRecord;
use async_trait::async_trait;
use std::path::Path;
use tracing::warn;

/// Reads authorship metadata from a local file
///
/// [`inspect`](MetadataExtractor::inspect) reports failures as errors so the
/// pipeline can count them; [`extract`](MetadataExtractor::extract) is the
/// forgiving wrapper that logs and returns an empty record instead.
///
/// # Examples
///
/// ```no_run
/// use meta_sniffer::metadata::{CliMetadataExtractor, MetadataExtractor};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() {
/// let extractor = CliMetadataExtractor::from_path()
///     .expect("exiftool not found in PATH");
///
/// let record = extractor.extract(Path::new("downloads/report.pdf")).await;
/// println!("author: {:?}", record.author);
/// # }
/// ```
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Inspect a file and normalize its metadata
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The external tool cannot be launched
    /// - The tool exits with a non-zero status
    /// - The tool output cannot be parsed
    async fn inspect(&self, path: &Path) -> crate::Result<MetadataRecord>;

    /// Inspect a file, mapping any failure to an empty record
    async fn extract(&self, path: &Path) -> MetadataRecord {
        match self.inspect(path).await {
            Ok(record) => record,
            Err(e) => {
                warn!(file = ?path, error = %e, "error extracting metadata");
                MetadataRecord::default()
            }
        }
    }

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
