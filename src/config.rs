//! Configuration types for meta-sniffer

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Environment variable holding the API identifier (required)
pub const ENV_API_ID: &str = "TELEGRAM_API_ID";
/// Environment variable holding the API hash (required)
pub const ENV_API_HASH: &str = "TELEGRAM_API_HASH";
/// Environment variable overriding the channel gateway URL
pub const ENV_GATEWAY_URL: &str = "META_SNIFFER_GATEWAY_URL";
/// Environment variable overriding the session name
pub const ENV_SESSION: &str = "META_SNIFFER_SESSION";
/// Environment variable overriding the scoped storage directory
pub const ENV_DOWNLOAD_DIR: &str = "META_SNIFFER_DOWNLOAD_DIR";
/// Environment variable pointing at the exiftool binary
pub const ENV_EXIFTOOL_PATH: &str = "EXIFTOOL_PATH";
/// Environment variable overriding extraction parallelism
pub const ENV_CONCURRENCY: &str = "META_SNIFFER_CONCURRENCY";

/// Remote channel service settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// API identifier used to authenticate the session
    #[serde(default)]
    pub api_id: String,

    /// API hash used to authenticate the session
    #[serde(default)]
    pub api_hash: String,

    /// Session name (default: "meta_sniffer")
    #[serde(default = "default_session_name")]
    pub session_name: String,

    /// Base URL of the channel gateway (default: "http://127.0.0.1:8081")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (default: 60s)
    #[serde(with = "duration_serde", default = "default_request_timeout")]
    pub request_timeout: Duration,

    /// Messages requested per history page (default: 100)
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            api_id: String::new(),
            api_hash: String::new(),
            session_name: default_session_name(),
            base_url: default_base_url(),
            request_timeout: default_request_timeout(),
            page_size: default_page_size(),
        }
    }
}

/// Scoped storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Transient working directory (default: "./downloads")
    ///
    /// Emptied at the end of every run.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
        }
    }
}

/// External tool paths
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to exiftool executable (auto-detected if None)
    #[serde(default)]
    pub exiftool_path: Option<PathBuf>,

    /// Whether to search PATH for exiftool if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            exiftool_path: None,
            search_path: true,
        }
    }
}

/// Which attachments are considered documents
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Required file name suffix, including the dot (default: ".pdf")
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Required declared MIME type (default: "application/pdf")
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            extension: default_extension(),
            mime_type: default_mime_type(),
        }
    }
}

/// Metadata extraction settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Maximum metadata tool processes running at once (default: 4)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

/// Main configuration for MetaSniffer
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote channel service settings
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Scoped storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Attachment filter settings
    #[serde(default)]
    pub filter: FilterConfig,

    /// Metadata extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// `TELEGRAM_API_ID` and `TELEGRAM_API_HASH` are required; everything else
    /// falls back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| {
                Error::config(
                    format!("please set the {key} environment variable"),
                    key,
                )
            })
        };

        let mut config = Config::default();
        config.channel.api_id = require(ENV_API_ID)?;
        config.channel.api_hash = require(ENV_API_HASH)?;

        if let Some(url) = get(ENV_GATEWAY_URL) {
            config.channel.base_url = url;
        }
        if let Some(session) = get(ENV_SESSION) {
            config.channel.session_name = session;
        }
        if let Some(dir) = get(ENV_DOWNLOAD_DIR) {
            config.storage.download_dir = PathBuf::from(dir);
        }
        if let Some(path) = get(ENV_EXIFTOOL_PATH) {
            config.tools.exiftool_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = get(ENV_CONCURRENCY) {
            config.extraction.max_concurrent = raw.trim().parse().map_err(|_| {
                Error::config(
                    format!("{ENV_CONCURRENCY} must be a positive integer, got '{raw}'"),
                    ENV_CONCURRENCY,
                )
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.channel.api_id.trim().is_empty() {
            return Err(Error::config("api_id must not be empty", "api_id"));
        }
        if self.channel.api_hash.trim().is_empty() {
            return Err(Error::config("api_hash must not be empty", "api_hash"));
        }
        if self.channel.page_size == 0 {
            return Err(Error::config("page_size must be at least 1", "page_size"));
        }
        if let Err(e) = url::Url::parse(&self.channel.base_url) {
            return Err(Error::config(
                format!("invalid gateway URL '{}': {e}", self.channel.base_url),
                "base_url",
            ));
        }
        if self.extraction.max_concurrent == 0 {
            return Err(Error::config(
                "max_concurrent must be at least 1",
                "max_concurrent",
            ));
        }
        if !self.filter.extension.starts_with('.') || self.filter.extension.len() < 2 {
            return Err(Error::config(
                format!(
                    "extension must start with a dot, got '{}'",
                    self.filter.extension
                ),
                "extension",
            ));
        }
        if self.storage.download_dir.as_os_str().is_empty() {
            return Err(Error::config(
                "download_dir must not be empty",
                "download_dir",
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_session_name() -> String {
    "meta_sniffer".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:8081".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_page_size() -> u32 {
    100
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_true() -> bool {
    true
}

fn default_extension() -> String {
    ".pdf".to_string()
}

fn default_mime_type() -> String {
    "application/pdf".to_string()
}

fn default_max_concurrent() -> usize {
    4
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
