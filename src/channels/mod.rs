//! Channel abstraction for message I/O.
//!
//! Inbound posts arrive through a `MessageSource`; outbound traffic goes
//! through the pipeline's `ForwardSink` and `Notifier` seams.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::ChannelError;
use crate::pipeline::types::InboundMessage;

pub mod email;
pub mod telegram;

pub use email::{EmailConfig, EmailNotifier};
pub use telegram::TelegramChannel;

/// Stream of inbound messages produced by a source.
pub type MessageStream = Pin<Box<dyn Stream<Item = InboundMessage> + Send>>;

/// A source of channel posts.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &str;

    /// Begin receiving posts. The stream ends after `shutdown`.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Verify credentials and connectivity.
    async fn health_check(&self) -> Result<(), ChannelError>;

    /// Stop receiving posts.
    async fn shutdown(&self) -> Result<(), ChannelError>;
}
