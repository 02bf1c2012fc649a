//! Fire-and-forget publishing of domain events to NATS.

use crate::domain::events::DomainEvent;

#[derive(Clone, Default)]
pub struct EventPublisher { nats: Option<async_nats::Client> }

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn disabled() -> Self { Self::default() }

    /// Publishes `event`. Failures are logged and never reach the caller.
    pub async fn publish(&self, event: DomainEvent) {
        let Some(nats) = &self.nats else {
            tracing::debug!(subject = event.subject(), "event publishing disabled");
            return;
        };
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => { tracing::warn!(error = %e, "failed to encode event"); return; }
        };
        if let Err(e) = nats.publish(event.subject().to_string(), payload.into()).await {
            tracing::warn!(subject = event.subject(), error = %e, "failed to publish event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::OrderEvent;

    #[tokio::test]
    async fn test_disabled_publisher_swallows_events() {
        let p = EventPublisher::disabled();
        p.publish(DomainEvent::Order(OrderEvent::TrackingUpdated { order_id: 1, tracking_number: "TRK".into() })).await;
    }
}
