//! Outbound publishing of allocation events to other systems.

use async_trait::async_trait;
use domain::{DomainEvent, Event};

use crate::Result;

/// Channel that allocated lines are published on.
pub const LINE_ALLOCATED_CHANNEL: &str = "line_allocated";

/// Publishes events to an external channel.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, channel: &str, event: &Event) -> Result<()>;
}

/// Publisher that only logs what it would send.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPublisher;

#[async_trait]
impl EventPublisher for LoggingPublisher {
    async fn publish(&self, channel: &str, event: &Event) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        tracing::info!(
            channel,
            event_type = event.event_type(),
            %payload,
            "publishing event"
        );
        Ok(())
    }
}
