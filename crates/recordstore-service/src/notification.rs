//! Change notifications
//!
//! Every committed change is announced with one `PubSubInfo` per record.
//! The emitter splits messages into batches for the sink. Delivery is
//! best effort: the change is already durable, so a failed publish is
//! logged and counted but never undoes or fails the operation.

use async_trait::async_trait;
use recordstore_auth::RequestContext;
use recordstore_common::{PubSubInfo, Result};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::metrics;

/// Default number of messages per publish call
pub const DEFAULT_PUBLISH_BATCH_SIZE: usize = 50;

/// Trait for message bus publishers
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish_message(&self, ctx: &RequestContext, messages: &[PubSubInfo]) -> Result<()>;
}

/// Sink that only logs messages (CLI and local runs)
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotificationSink;

#[async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn publish_message(&self, ctx: &RequestContext, messages: &[PubSubInfo]) -> Result<()> {
        for message in messages {
            info!(
                record_id = %message.id,
                kind = %message.kind,
                op = %message.op,
                correlation_id = %ctx.correlation_id,
                "Record changed"
            );
        }
        Ok(())
    }
}

/// Batches change messages onto a sink
#[derive(Clone)]
pub struct NotificationEmitter {
    sink: Arc<dyn NotificationSink>,
    batch_size: usize,
}

impl NotificationEmitter {
    pub fn new(sink: Arc<dyn NotificationSink>, batch_size: usize) -> Self {
        Self {
            sink,
            batch_size: batch_size.max(1),
        }
    }

    /// Publish messages in batches; failures are logged, not returned
    pub async fn emit(&self, ctx: &RequestContext, messages: &[PubSubInfo]) {
        if messages.is_empty() {
            return;
        }
        for batch in messages.chunks(self.batch_size) {
            match self.sink.publish_message(ctx, batch).await {
                Ok(()) => debug!(count = batch.len(), "Published change notifications"),
                Err(e) => {
                    metrics::notification_failed(batch.len());
                    error!(
                        count = batch.len(),
                        correlation_id = %ctx.correlation_id,
                        "Failed to publish change notifications: {}",
                        e
                    );
                }
            }
        }
    }
}
