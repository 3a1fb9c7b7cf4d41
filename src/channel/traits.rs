//! Trait for the remote channel service

use crate::types::ChannelMessage;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::path::Path;

/// Capability to read a channel's history and fetch attachments
///
/// The fetcher only relies on this interface; transport details live in the
/// implementation (see [`HttpChannelClient`](super::HttpChannelClient)).
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Establish a session with the service
    async fn connect(&self) -> crate::Result<()>;

    /// Tear the session down
    async fn disconnect(&self) -> crate::Result<()>;

    /// Lazily iterate the messages of a channel in the service's native order
    ///
    /// An `Err` item means iteration cannot continue.
    fn iter_messages<'a>(
        &'a self,
        channel: &'a str,
    ) -> BoxStream<'a, crate::Result<ChannelMessage>>;

    /// Save the attachment of `message` to `destination`
    ///
    /// An existing file at `destination` is overwritten.
    async fn download_attachment(
        &self,
        message: &ChannelMessage,
        destination: &Path,
    ) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
