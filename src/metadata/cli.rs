//! CLI-based metadata extractor using the external exiftool binary

use super::parser::parse_exiftool_output;
use super::traits::MetadataExtractor;
use crate::error::ExtractionError;
use crate::types::MetadataRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Metadata extractor running `exiftool -json <file>`
///
/// # Examples
///
/// ```no_run
/// use meta_sniffer::metadata::{CliMetadataExtractor, MetadataExtractor};
/// use std::path::{Path, PathBuf};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Create with explicit path
/// let extractor = CliMetadataExtractor::new(PathBuf::from("/usr/bin/exiftool"));
///
/// // Or auto-discover from PATH
/// let extractor = CliMetadataExtractor::from_path()
///     .expect("exiftool not found in PATH");
///
/// let record = extractor.inspect(Path::new("report.pdf")).await?;
/// # Ok(())
/// # }
/// ```
pub struct CliMetadataExtractor {
    binary_path: PathBuf,
}

impl CliMetadataExtractor {
    /// Create a new extractor with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find exiftool in PATH
    pub fn from_path() -> Option<Self> {
        which::which("exiftool").ok().map(Self::new)
    }

    /// Binary this extractor runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

#[async_trait]
impl MetadataExtractor for CliMetadataExtractor {
    #[tracing::instrument(level = "debug", skip(self), fields(tool = %self.binary_path.display()))]
    async fn inspect(&self, path: &Path) -> crate::Result<MetadataRecord> {
        let output = Command::new(&self.binary_path)
            .arg("-json")
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractionError::Launch {
                path: path.to_path_buf(),
                reason: format!("failed to execute {}: {e}", self.binary_path.display()),
            })?;

        if !output.status.success() {
            return Err(ExtractionError::ToolFailed {
                path: path.to_path_buf(),
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        let record = parse_exiftool_output(path, &output.stdout)?;
        debug!(file = ?path, author = ?record.author, "metadata extracted");
        Ok(record)
    }

    fn name(&self) -> &'static str {
        "cli-exiftool"
    }
}
