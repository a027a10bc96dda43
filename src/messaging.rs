//! Publishes domain events to NATS when a connection is configured.

use crate::domain::events::DomainEvent;

pub const SUBJECT_PREFIX: &str = "nexonic";

#[derive(Clone, Default)]
pub struct EventBus { nats: Option<async_nats::Client> }

impl EventBus {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }
    pub fn disabled() -> Self { Self::default() }

    /// Best effort: failures are logged and never reach the caller.
    pub async fn publish(&self, events: Vec<DomainEvent>) {
        let Some(client) = &self.nats else { return };
        for event in events {
            let subject = subject_for(&event);
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

pub fn subject_for(event: &DomainEvent) -> String { format!("{}.{}", SUBJECT_PREFIX, event.subject()) }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::OrderEvent;
    use uuid::Uuid;

    #[test]
    fn test_subject_naming() {
        let event = DomainEvent::Order(OrderEvent::Cancelled { order_id: Uuid::nil() });
        assert_eq!(subject_for(&event), "nexonic.order.cancelled");
    }

    #[tokio::test]
    async fn test_disabled_bus_is_noop() {
        EventBus::disabled().publish(vec![DomainEvent::Order(OrderEvent::Cancelled { order_id: Uuid::nil() })]).await;
    }
}
