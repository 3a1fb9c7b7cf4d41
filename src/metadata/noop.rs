//! No-op metadata extractor for graceful degradation

use super::traits::MetadataExtractor;
use crate::types::MetadataRecord;
use async_trait::async_trait;
use std::path::Path;

/// Extractor used when no exiftool binary is available
///
/// Every file fails inspection with `Error::NotSupported`, so the pipeline
/// still runs (and still cleans up) but retains no records.
///
/// # Examples
///
/// ```
/// use meta_sniffer::metadata::{MetadataExtractor, NoOpMetadataExtractor};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() {
/// let extractor = NoOpMetadataExtractor;
///
/// assert!(extractor.inspect(Path::new("report.pdf")).await.is_err());
/// assert!(extractor.extract(Path::new("report.pdf")).await.is_empty());
/// # }
/// ```
pub struct NoOpMetadataExtractor;

#[async_trait]
impl MetadataExtractor for NoOpMetadataExtractor {
    async fn inspect(&self, _path: &Path) -> crate::Result<MetadataRecord> {
        Err(crate::Error::NotSupported(
            "metadata extraction requires the external exiftool binary. \
             Set EXIFTOOL_PATH or ensure exiftool is in PATH."
                .into(),
        ))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inspect_returns_not_supported() {
        let result = NoOpMetadataExtractor.inspect(Path::new("test.pdf")).await;
        match result {
            Err(crate::Error::NotSupported(msg)) => {
                assert!(msg.contains("exiftool"));
                assert!(msg.contains("EXIFTOOL_PATH") || msg.contains("PATH"));
            }
            other => panic!("Expected NotSupported error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_extract_yields_empty_record() {
        let record = NoOpMetadataExtractor.extract(Path::new("test.pdf")).await;
        assert!(record.is_empty());
    }
}
