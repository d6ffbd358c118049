use core_types::Fill;
use serde::Serialize;
use tokio::sync::broadcast;

/// A typed event published by the core for external consumers (alerting,
/// dashboards, log shippers). Delivery is at-least-once, fire-and-forget.
/// `tag` and `content` give a clean JSON representation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Event {
    TradeExecuted(Fill),
    Error {
        source: String,
        message: String,
        timestamp_ms: i64,
    },
    RiskTripped {
        rule: String,
        detail: String,
        timestamp_ms: i64,
    },
    StrategyStatus {
        worker: String,
        status: String,
        timestamp_ms: i64,
    },
    Warning {
        source: String,
        message: String,
        timestamp_ms: i64,
    },
}

/// Fan-out bus for `Event`s. Publishing never blocks and never fails from
/// the producer's point of view; with no subscribers the event is dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_is_fire_and_forget_without_subscribers() {
        let bus = EventBus::new(8);
        // Must not panic or block with nobody listening.
        bus.publish(Event::Warning {
            source: "test".into(),
            message: "low balance".into(),
            timestamp_ms: 0,
        });
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(Event::StrategyStatus {
            worker: "w1".into(),
            status: "stopped".into(),
            timestamp_ms: 42,
        });
        match rx.recv().await.unwrap() {
            Event::StrategyStatus { worker, status, timestamp_ms } => {
                assert_eq!(worker, "w1");
                assert_eq!(status, "stopped");
                assert_eq!(timestamp_ms, 42);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
