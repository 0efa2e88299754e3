use anyhow::Result;
use async_trait::async_trait;

use crate::domain::order::OrderEvent;

// ============================================================================
// Notification Sink - where committed domain events end up
// ============================================================================

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, event: &OrderEvent) -> Result<()>;
}

/// Writes every event to the log as JSON. Used when no external channel is
/// wired in.
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    async fn deliver(&self, event: &OrderEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        tracing::info!(
            event_type = event.event_type(),
            order_id = %event.order_id(),
            recipient = %event.recipient(),
            payload = %payload,
            "📨 Notification"
        );
        Ok(())
    }
}

#[cfg(test)]
pub use recording::RecordingSink;
