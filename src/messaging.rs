//! Domain event publishing over NATS

use crate::domain::events::DomainEvent;

/// Publishes events when a NATS connection is configured; otherwise only logs them.
#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn disabled() -> Self { Self::default() }

    /// Delivery failures are logged and dropped.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        for event in events {
            let subject = event.subject();
            let Some(client) = &self.nats else {
                tracing::debug!(%subject, "event (nats disabled)");
                continue;
            };
            let payload = match serde_json::to_vec(&event) {
                Ok(p) => p,
                Err(e) => { tracing::warn!(%subject, error = %e, "failed to encode event"); continue; }
            };
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                tracing::warn!(%subject, error = %e, "failed to publish event");
            }
        }
    }
}
