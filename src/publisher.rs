//! Domain events out to NATS. Publishing is best effort: a lost event is
//! logged, the order stays committed.

use crate::domain::events::DomainEvent;

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl EventPublisher {
    pub fn new(nats: Option<async_nats::Client>) -> Self { Self { nats } }

    pub fn disabled() -> Self { Self::default() }

    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::disabled() };
        match async_nats::connect(url).await {
            Ok(client) => { tracing::info!(%url, "connected to NATS"); Self::new(Some(client)) }
            Err(e) => { tracing::warn!(%url, error = %e, "NATS unavailable, events disabled"); Self::disabled() }
        }
    }

    pub async fn publish_all(&self, events: Vec<DomainEvent>) {
        let Some(client) = &self.nats else { return };
        for event in events {
            let subject = event.subject();
            let payload = match serde_json::to_vec(&event) {
                Ok(p) => p,
                Err(e) => { tracing::warn!(subject, error = %e, "cannot serialize event"); continue; }
            };
            if let Err(e) = client.publish(subject.to_string(), payload.into()).await {
                tracing::warn!(subject, error = %e, "event publish failed");
            }
        }
    }
}
