//! In-memory event bus for tests and single-process runs.
//!
//! Every subscriber sees every event published after it subscribed, filtered
//! to its topics. There are no consumer groups and no offsets: a late
//! subscriber does not see history, which [`InMemoryEventBus::published`]
//! exposes separately for assertions.

use airport_core::event::SerializedEvent;
use airport_core::event_bus::{EventBus, EventBusError, EventStream};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// In-memory [`EventBus`] backed by a broadcast channel
///
/// # Example
///
/// ```
/// use airport_core::event::SerializedEvent;
/// use airport_core::event_bus::EventBus;
/// use airport_testing::InMemoryEventBus;
/// use futures::StreamExt;
///
/// # tokio_test::block_on(async {
/// let bus = InMemoryEventBus::new();
/// let mut stream = bus.subscribe(&["baggage"]).await.unwrap();
///
/// let event = SerializedEvent::new("Moved.v1".to_string(), b"{}".to_vec(), None);
/// bus.publish("baggage", &event).await.unwrap();
///
/// let received = stream.next().await.unwrap().unwrap();
/// assert_eq!(received.event_type, "Moved.v1");
/// # });
/// ```
#[derive(Debug)]
pub struct InMemoryEventBus {
    sender: broadcast::Sender<(String, SerializedEvent)>,
    published: Mutex<Vec<(String, SerializedEvent)>>,
}

impl InMemoryEventBus {
    /// Create a bus buffering up to 1024 undelivered events per subscriber
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a bus with a custom per-subscriber buffer
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: Mutex::new(Vec::new()),
        }
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Every event ever published to `topic`, oldest first
    #[must_use]
    pub fn published(&self, topic: &str) -> Vec<SerializedEvent> {
        self.published
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let entry = (topic.to_string(), event.clone());
        Box::pin(async move {
            self.published
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(entry.clone());
            // No subscribers is not an error: the event is simply not delivered.
            let _ = self.sender.send(entry);
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(ToString::to_string).collect();
        let mut receiver = self.sender.subscribe();

        Box::pin(async move {
            if topics.is_empty() {
                return Err(EventBusError::SubscriptionFailed {
                    topics,
                    reason: "no topics given".to_string(),
                });
            }

            let stream = async_stream::stream! {
                loop {
                    match receiver.recv().await {
                        Ok((topic, event)) => {
                            if topics.contains(&topic) {
                                yield Ok(event);
                            }
                        },
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            yield Err(EventBusError::TransportError(format!(
                                "subscriber lagged, {skipped} events skipped"
                            )));
                        },
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use futures::StreamExt;
    use std::time::Duration;

    fn event(kind: &str) -> SerializedEvent {
        SerializedEvent::new(kind.to_string(), b"{}".to_vec(), None)
    }

    #[tokio::test]
    async fn subscribers_only_see_their_topics() {
        let bus = InMemoryEventBus::new();
        let mut stream = bus.subscribe(&["baggage"]).await.unwrap();

        bus.publish("gates", &event("GateChanged.v1")).await.unwrap();
        bus.publish("baggage", &event("Moved.v1")).await.unwrap();

        let received = stream.next().await.unwrap().unwrap();
        assert_eq!(received.event_type, "Moved.v1");
        assert!(
            tokio::time::timeout(Duration::from_millis(20), stream.next())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn published_log_keeps_history_per_topic() {
        let bus = InMemoryEventBus::new();
        bus.publish("baggage", &event("A.v1")).await.unwrap();
        bus.publish("baggage", &event("B.v1")).await.unwrap();
        bus.publish("gates", &event("C.v1")).await.unwrap();

        let history = bus.published("baggage");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].event_type, "B.v1");
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_an_error_then_resumes() {
        let bus = InMemoryEventBus::with_capacity(2);
        let mut stream = bus.subscribe(&["baggage"]).await.unwrap();

        for kind in ["A.v1", "B.v1", "C.v1", "D.v1"] {
            bus.publish("baggage", &event(kind)).await.unwrap();
        }

        assert!(matches!(
            stream.next().await.unwrap(),
            Err(EventBusError::TransportError(_))
        ));
        assert_eq!(stream.next().await.unwrap().unwrap().event_type, "C.v1");
    }

    #[tokio::test]
    async fn empty_topic_list_is_rejected() {
        let bus = InMemoryEventBus::new();
        assert!(matches!(
            bus.subscribe(&[]).await,
            Err(EventBusError::SubscriptionFailed { .. })
        ));
    }
}
