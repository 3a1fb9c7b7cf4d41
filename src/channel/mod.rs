//! Remote channel access and attachment fetching
//!
//! - [`ChannelClient`]: capability to list a channel's messages and download attachments
//! - [`HttpChannelClient`]: implementation talking to a JSON gateway over HTTP
//! - [`AttachmentFilter`]: type and date-window predicate applied to each message
//! - [`ChannelFetcher`]: iterates, filters and downloads into scoped storage
//!
//! ## Usage
//!
//! ```no_run
//! use meta_sniffer::channel::{ChannelFetcher, HttpChannelClient};
//! use meta_sniffer::config::Config;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let client = Arc::new(HttpChannelClient::new(&config.channel)?);
//! let fetcher = ChannelFetcher::new(client, config.filter.clone());
//!
//! let files = fetcher
//!     .fetch_files("some_channel", Path::new("downloads"), None, None)
//!     .await;
//! println!("fetched {} files", files.len());
//! # Ok(())
//! # }
//! ```

mod fetcher;
mod filter;
mod http;
mod traits;

pub use fetcher::ChannelFetcher;
pub use filter::{AttachmentFilter, Rejection};
pub use http::HttpChannelClient;
pub use traits::ChannelClient;
