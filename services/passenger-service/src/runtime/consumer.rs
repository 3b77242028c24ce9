//! Event bus consumer with reconnection and dead-lettering.
//!
//! # Pattern: Subscribe-Process-Reconnect Loop
//!
//! ```text
//! loop {
//!     subscribe (retry on failure)
//!     loop {
//!         next event
//!         handle it; on error push it to the DLQ
//!         stop on shutdown
//!     }
//!     stream ended: wait, then resubscribe
//! }
//! ```
//!
//! A failing event never stops the loop. It lands in the
//! [`DeadLetterQueue`] with the handler's error message and the consumer
//! moves on to the next one. A record the bus could not decode is
//! dead-lettered too, under [`UNDECODABLE_EVENT_TYPE`] with its raw payload.
//!
//! # Example
//!
//! ```rust,ignore
//! let consumer = EventConsumer::builder()
//!     .name("baggage")
//!     .topics(vec![BAGGAGE_TOPIC.to_string()])
//!     .event_bus(event_bus)
//!     .handler(Arc::new(BaggageEventHandler::new(directory)))
//!     .shutdown(shutdown_tx.subscribe())
//!     .build()?;
//!
//! let dead_letters = consumer.dead_letters();
//! let handle = consumer.spawn();
//! ```

use super::EventHandler;
use airport_core::event::SerializedEvent;
use airport_core::event_bus::{EventBus, EventBusError, EventStream};
use airport_runtime::DeadLetterQueue;
use airport_runtime::metrics::EventBusMetrics;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Event type given to dead letters built from records the bus could not decode
pub const UNDECODABLE_EVENT_TYPE: &str = "undecodable";

/// A required builder field was not set
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("event consumer is missing `{0}`")]
pub struct MissingField(pub &'static str);

/// Event bus consumer feeding one [`EventHandler`].
///
/// Runs until the shutdown channel fires or every sender is dropped.
pub struct EventConsumer {
    name: String,
    topics: Vec<String>,
    event_bus: Arc<dyn EventBus>,
    handler: Arc<dyn EventHandler>,
    shutdown: broadcast::Receiver<()>,
    retry_delay: Duration,
    dead_letters: DeadLetterQueue<SerializedEvent>,
}

impl EventConsumer {
    /// Create a builder for configuring a consumer.
    #[must_use]
    pub fn builder() -> EventConsumerBuilder {
        EventConsumerBuilder::default()
    }

    /// Shared handle to this consumer's dead letter queue
    #[must_use]
    pub fn dead_letters(&self) -> DeadLetterQueue<SerializedEvent> {
        self.dead_letters.clone()
    }

    /// Spawn the consumer as a background task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&mut self) {
        info!(consumer = %self.name, topics = ?self.topics, "Event consumer started");

        loop {
            let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();

            let subscribed = tokio::select! {
                _ = self.shutdown.recv() => break,
                result = self.event_bus.subscribe(&topics) => result,
            };

            match subscribed {
                Ok(mut stream) => {
                    info!(consumer = %self.name, "Subscribed to event bus");
                    if self.process_stream(&mut stream).await.is_break() {
                        break;
                    }
                    warn!(
                        consumer = %self.name,
                        "Event stream ended, reconnecting in {:?}",
                        self.retry_delay
                    );
                },
                Err(e) => {
                    error!(
                        consumer = %self.name,
                        error = %e,
                        "Failed to subscribe to event bus, retrying in {:?}",
                        self.retry_delay
                    );
                },
            }

            tokio::select! {
                _ = self.shutdown.recv() => break,
                () = tokio::time::sleep(self.retry_delay) => {},
            }
        }

        info!(consumer = %self.name, "Event consumer stopped");
    }

    /// Drain `stream` until it ends (`Continue`) or shutdown fires (`Break`).
    async fn process_stream(&mut self, stream: &mut EventStream) -> std::ops::ControlFlow<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Shutdown received during processing");
                    return std::ops::ControlFlow::Break(());
                }
                next = stream.next() => match next {
                    Some(Ok(event)) => self.dispatch(event).await,
                    Some(Err(EventBusError::Undecodable { reason, data })) => {
                        EventBusMetrics::record_consume_error();
                        warn!(consumer = %self.name, reason = %reason, "Undecodable record, dead-lettering");
                        self.dead_letters.push(
                            SerializedEvent::new(UNDECODABLE_EVENT_TYPE.to_string(), data, None),
                            reason,
                            1,
                        );
                    },
                    Some(Err(e)) => {
                        EventBusMetrics::record_consume_error();
                        error!(consumer = %self.name, error = %e, "Error receiving event from stream");
                    },
                    None => return std::ops::ControlFlow::Continue(()),
                },
            }
        }
    }

    async fn dispatch(&self, event: SerializedEvent) {
        EventBusMetrics::record_consume();

        if let Err(e) = self.handler.handle(&event).await {
            warn!(
                consumer = %self.name,
                event_type = %event.event_type,
                error = %e,
                "Event handling failed, dead-lettering"
            );
            self.dead_letters.push(event, e.to_string(), 1);
        }
    }
}

impl std::fmt::Debug for EventConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventConsumer")
            .field("name", &self.name)
            .field("topics", &self.topics)
            .field("retry_delay", &self.retry_delay)
            .field("dead_letters", &self.dead_letters.len())
            .finish_non_exhaustive()
    }
}

/// Builder for an [`EventConsumer`].
#[derive(Default)]
pub struct EventConsumerBuilder {
    name: Option<String>,
    topics: Option<Vec<String>>,
    event_bus: Option<Arc<dyn EventBus>>,
    handler: Option<Arc<dyn EventHandler>>,
    shutdown: Option<broadcast::Receiver<()>>,
    retry_delay: Option<Duration>,
    dead_letters: Option<DeadLetterQueue<SerializedEvent>>,
}

impl EventConsumerBuilder {
    /// Set consumer name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set topics to subscribe to.
    #[must_use]
    pub fn topics(mut self, topics: Vec<String>) -> Self {
        self.topics = Some(topics);
        self
    }

    /// Set event bus instance.
    #[must_use]
    pub fn event_bus(mut self, event_bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Set event handler.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Set shutdown signal receiver.
    #[must_use]
    pub fn shutdown(mut self, shutdown: broadcast::Receiver<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Set custom retry delay (default: 5 seconds).
    #[must_use]
    pub const fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Use a shared dead letter queue (default: a fresh one holding 1000).
    #[must_use]
    pub fn dead_letters(mut self, dead_letters: DeadLetterQueue<SerializedEvent>) -> Self {
        self.dead_letters = Some(dead_letters);
        self
    }

    /// Build the `EventConsumer`.
    ///
    /// # Errors
    ///
    /// Returns [`MissingField`] naming the first required field that was not
    /// set (name, topics, event bus, handler, shutdown).
    pub fn build(self) -> Result<EventConsumer, MissingField> {
        Ok(EventConsumer {
            name: self.name.ok_or(MissingField("name"))?,
            topics: self.topics.ok_or(MissingField("topics"))?,
            event_bus: self.event_bus.ok_or(MissingField("event_bus"))?,
            handler: self.handler.ok_or(MissingField("handler"))?,
            shutdown: self.shutdown.ok_or(MissingField("shutdown"))?,
            retry_delay: self.retry_delay.unwrap_or_else(|| Duration::from_secs(5)),
            dead_letters: self.dead_letters.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::runtime::HandlerError;
    use airport_contract::{AirportError, PassengerId};
    use airport_testing::InMemoryEventBus;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Accepts events whose payload is `ok`, rejects everything else.
    #[derive(Default)]
    struct PickyHandler {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventHandler for PickyHandler {
        async fn handle(&self, event: &SerializedEvent) -> Result<(), HandlerError> {
            self.seen.lock().unwrap().push(event.event_type.clone());
            if event.data == b"ok" {
                Ok(())
            } else {
                Err(AirportError::UnknownPassenger(PassengerId::new(0)).into())
            }
        }
    }

    fn event(kind: &str, data: &[u8]) -> SerializedEvent {
        SerializedEvent::new(kind.to_string(), data.to_vec(), None)
    }

    async fn wait_for(condition: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn failing_event_is_dead_lettered_and_loop_continues() {
        let bus = Arc::new(InMemoryEventBus::new());
        let handler = Arc::new(PickyHandler::default());
        let (shutdown_tx, _) = broadcast::channel(1);

        let consumer = EventConsumer::builder()
            .name("test")
            .topics(vec!["baggage".to_string()])
            .event_bus(Arc::clone(&bus) as Arc<dyn EventBus>)
            .handler(Arc::clone(&handler) as Arc<dyn EventHandler>)
            .shutdown(shutdown_tx.subscribe())
            .build()
            .unwrap();
        let dead_letters = consumer.dead_letters();
        let handle = consumer.spawn();

        wait_for(|| bus.subscriber_count() == 1).await;

        bus.publish("baggage", &event("A.v1", b"ok")).await.unwrap();
        bus.publish("baggage", &event("B.v1", b"bad")).await.unwrap();
        bus.publish("baggage", &event("C.v1", b"ok")).await.unwrap();

        wait_for(|| handler.seen.lock().unwrap().len() == 3).await;

        let letters = dead_letters.snapshot();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].payload.event_type, "B.v1");
        assert_eq!(letters[0].attempts, 1);
        assert!(letters[0].error_message.contains("not registered"));

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("consumer stops on shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn empty_topic_list_retries_until_shutdown() {
        let bus = Arc::new(InMemoryEventBus::new());
        let (shutdown_tx, _) = broadcast::channel(1);

        let handle = EventConsumer::builder()
            .name("no-topics")
            .topics(Vec::new())
            .event_bus(bus as Arc<dyn EventBus>)
            .handler(Arc::new(PickyHandler::default()) as Arc<dyn EventHandler>)
            .shutdown(shutdown_tx.subscribe())
            .retry_delay(Duration::from_millis(10))
            .build()
            .unwrap()
            .spawn();

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handle.is_finished());

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("consumer stops on shutdown")
            .unwrap();
    }

    /// Bus whose single subscription yields a fixed script, then stays open
    struct ScriptedBus {
        script: Mutex<Option<Vec<Result<SerializedEvent, EventBusError>>>>,
    }

    impl EventBus for ScriptedBus {
        fn publish(
            &self,
            _topic: &str,
            _event: &SerializedEvent,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), EventBusError>> + Send + '_>>
        {
            Box::pin(async { Ok(()) })
        }

        fn subscribe(
            &self,
            _topics: &[&str],
        ) -> std::pin::Pin<
            Box<dyn std::future::Future<Output = Result<EventStream, EventBusError>> + Send + '_>,
        > {
            let items = self.script.lock().unwrap().take().unwrap_or_default();
            Box::pin(async move {
                let stream = futures::stream::iter(items).chain(futures::stream::pending());
                Ok(Box::pin(stream) as EventStream)
            })
        }
    }

    #[tokio::test]
    async fn undecodable_record_is_dead_lettered_with_its_payload() {
        let bus = Arc::new(ScriptedBus {
            script: Mutex::new(Some(vec![
                Err(EventBusError::Undecodable {
                    reason: "Message carries no event type".to_string(),
                    data: b"{\"baggageId\":555}".to_vec(),
                }),
                Ok(event("A.v1", b"ok")),
                Err(EventBusError::TransportError("broker hiccup".to_string())),
                Ok(event("B.v1", b"ok")),
            ])),
        });
        let handler = Arc::new(PickyHandler::default());
        let (shutdown_tx, _) = broadcast::channel(1);

        let consumer = EventConsumer::builder()
            .name("scripted")
            .topics(vec!["baggage".to_string()])
            .event_bus(bus as Arc<dyn EventBus>)
            .handler(Arc::clone(&handler) as Arc<dyn EventHandler>)
            .shutdown(shutdown_tx.subscribe())
            .build()
            .unwrap();
        let dead_letters = consumer.dead_letters();
        let handle = consumer.spawn();

        wait_for(|| handler.seen.lock().unwrap().len() == 2).await;

        let letters = dead_letters.snapshot();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].payload.event_type, UNDECODABLE_EVENT_TYPE);
        assert_eq!(letters[0].payload.data, b"{\"baggageId\":555}".to_vec());
        assert_eq!(letters[0].error_message, "Message carries no event type");
        assert_eq!(*handler.seen.lock().unwrap(), vec!["A.v1", "B.v1"]);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("consumer stops on shutdown")
            .unwrap();
    }

    #[test]
    fn builder_reports_missing_fields() {
        let err = EventConsumer::builder().name("x").build().unwrap_err();
        assert_eq!(err, MissingField("topics"));
    }
}
