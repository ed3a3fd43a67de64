//! In-process event fan-out over a tokio broadcast channel.
//!
//! Delivery is best-effort/at-most-once: a send with no live
//! subscribers (or to a lagging one) just drops the event, and
//! observers resynchronize from store reads.

use rollcall_core::event::Event;
use rollcall_core::store::EventSink;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct BroadcastEventBus {
    tx: broadcast::Sender<Event>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastEventBus {
    async fn publish(&self, event: Event) {
        // A send error only means nobody is listening right now.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::event::{EventPayload, Topic};
    use rollcall_core::models::session::SessionStatus;
    use uuid::Uuid;

    fn sample_event() -> Event {
        let session_id = Uuid::new_v4();
        Event::new(
            Topic::Session(session_id),
            EventPayload::SessionTransitioned {
                session_id,
                status: SessionStatus::Active,
                at: chrono::Utc::now(),
            },
        )
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = BroadcastEventBus::new(16);
        let mut rx = bus.subscribe();

        let event = sample_event();
        bus.publish(event.clone()).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event);
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_fine() {
        let bus = BroadcastEventBus::new(16);
        bus.publish(sample_event()).await;
    }
}
