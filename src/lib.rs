//! # meta-sniffer
//!
//! Downloads PDF attachments from a messaging channel, reads their document
//! metadata with exiftool and reports how many documents each author wrote.
//!
//! ## Pipeline
//!
//! 1. Connect to the channel through a [`channel::ChannelClient`]
//! 2. Download every attachment that passes the type and date filter into
//!    scoped storage
//! 3. Run a [`metadata::MetadataExtractor`] on each downloaded file
//! 4. Drop files without an author and count the rest per author
//! 5. Empty the scoped storage, whatever happened before
//!
//! ## Quick Start
//!
//! ```no_run
//! use meta_sniffer::{Config, MetaSniffer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sniffer = MetaSniffer::from_config(Config::from_env()?)?;
//!
//!     let mut events = sniffer.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = sniffer.run_with_report("some_channel", None, None).await?;
//!     for row in &report.statistics {
//!         println!("{}: {}", row.author, row.count);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Channel access, attachment filtering and downloading
pub mod channel;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Document metadata extraction
pub mod metadata;
/// Pipeline orchestration and aggregation
pub mod pipeline;
/// Result rendering
pub mod report;
/// Scoped download storage
pub mod storage;
/// Core data types
pub mod types;
/// Date parsing and file name helpers
pub mod utils;

pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{MetaSniffer, aggregate_authors};
pub use report::OutputFormat;
pub use types::{
    AnalysisReport, AuthorStatistic, ChannelMessage, Event, FetchedFile, MessageId,
    MetadataRecord, RetainedRecord,
};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Cancel `token` when the process receives a termination signal
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// The returned task finishes once the token is cancelled, either by a signal
/// or by someone else.
///
/// # Example
///
/// ```no_run
/// use meta_sniffer::{Config, MetaSniffer, cancel_on_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let sniffer = MetaSniffer::from_config(Config::from_env()?)?;
///     let watcher = cancel_on_signal(sniffer.cancel_token());
///
///     let stats = sniffer.run("some_channel", None, None).await;
///     watcher.abort();
///     println!("{:?}", stats?);
///     Ok(())
/// }
/// ```
pub fn cancel_on_signal(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                tracing::warn!("cancelling analysis");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
