//! Pipeline worker — drains a stream of inbound messages into the processor.
//!
//! The host picks the concurrency: 1 handles messages strictly one after
//! another, higher values interleave messages at their await points. Links
//! inside one message are always handled in order by the processor.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tracing::{error, info};

use crate::pipeline::processor::MessageProcessor;
use crate::pipeline::types::InboundMessage;

/// Handle every message from `messages` until the stream ends.
///
/// Each message runs in its own task so a panicking handler is logged and
/// does not take the worker down.
pub async fn run_pipeline<S>(processor: Arc<MessageProcessor>, messages: S, concurrency: usize)
where
    S: Stream<Item = InboundMessage>,
{
    let limit = concurrency.max(1);
    info!(concurrency = limit, "Pipeline worker started");

    messages
        .for_each_concurrent(limit, |message| {
            let processor = Arc::clone(&processor);
            async move {
                let id = message.id;
                let task = tokio::spawn(async move { processor.handle(message).await });
                if let Err(e) = task.await {
                    error!(id = %id, error = %e, "Message handler task panicked");
                }
            }
        })
        .await;

    info!("Message stream ended, pipeline worker stopping");
}
