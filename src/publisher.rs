//! Outbound domain events.
//!
//! Publication happens after the state change is committed and is best effort:
//! callers log failures and carry on.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::domain::events::DomainEvent;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> anyhow::Result<()>;
}

/// Publishes JSON-encoded events on `<prefix>.<event name>` subjects.
pub struct NatsPublisher {
    client: async_nats::Client,
    prefix: String,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self {
        Self { client, prefix: prefix.into() }
    }

    pub fn subject_for(&self, event: &DomainEvent) -> String { format!("{}.{}", self.prefix, event.name()) }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(event)?;
        self.client.publish(self.subject_for(event), payload.into()).await?;
        Ok(())
    }
}

/// Drops every event. Used when no broker is configured.
pub struct NullPublisher;

#[async_trait]
impl EventPublisher for NullPublisher {
    async fn publish(&self, event: &DomainEvent) -> anyhow::Result<()> {
        tracing::trace!(event = event.name(), "no event broker configured, dropping event");
        Ok(())
    }
}

/// Keeps published events in memory so they can be inspected.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &DomainEvent) -> anyhow::Result<()> {
        self.events.lock().map_err(|_| anyhow::anyhow!("event log poisoned"))?.push(event.clone());
        Ok(())
    }
}

/// Publishes each event, logging instead of failing when the broker rejects one.
pub async fn publish_all(publisher: &dyn EventPublisher, events: Vec<DomainEvent>) {
    for event in events {
        if let Err(err) = publisher.publish(&event).await {
            tracing::warn!(event = event.name(), error = %err, "failed to publish domain event");
        }
    }
}
