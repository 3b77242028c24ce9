//! Redpanda event bus for the baggage feed.
//!
//! Implements [`EventBus`] from `airport-core` on top of rdkafka, so it works
//! against Redpanda or any other Kafka-compatible broker.
//!
//! # Wire format
//!
//! The Kafka payload is the event's JSON body as-is, so upstream producers can
//! publish plain `{"baggageId": .., "passengerId": .., "newStatus": ..}`
//! records. The event type travels in the `event-type` header. A record
//! without that header gets the bus's default event type, when one is
//! configured; the message key is never read. Optional metadata travels as
//! JSON in the `event-metadata` header.
//!
//! A record that cannot be turned into an event is yielded as
//! [`EventBusError::Undecodable`] carrying the raw payload, so the subscriber
//! can dead-letter it.
//!
//! # Delivery Semantics
//!
//! **At-least-once delivery** with manual offset commits:
//! - A message's offset is committed when the subscriber polls for the next
//!   item, i.e. after it has finished with this one
//! - If the process crashes while a message is being handled, it is redelivered
//! - Handlers therefore see duplicates; the baggage handler does not dedupe
//!
//! # Example
//!
//! ```no_run
//! use airport_core::event_bus::EventBus;
//! use airport_redpanda::RedpandaEventBus;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let event_bus = RedpandaEventBus::builder()
//!     .brokers("localhost:9092")
//!     .consumer_group("passenger-service")
//!     .default_event_type("BaggageStateChanged.v1")
//!     .build()?;
//!
//! let mut stream = event_bus.subscribe(&["baggage-state-change"]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(event) => println!("Received: {}", event.event_type),
//!         Err(e) => eprintln!("Error: {e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

use airport_core::event::SerializedEvent;
use airport_core::event_bus::{EventBus, EventBusError, EventStream};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Header carrying [`SerializedEvent::event_type`]
pub const EVENT_TYPE_HEADER: &str = "event-type";

/// Header carrying [`SerializedEvent::metadata`] as JSON
pub const METADATA_HEADER: &str = "event-metadata";

const DEFAULT_OFFSET_RESET: &str = "earliest";

/// Kafka-compatible [`EventBus`].
///
/// The producer is created eagerly; each [`subscribe`](EventBus::subscribe)
/// call creates its own consumer in the configured group.
pub struct RedpandaEventBus {
    producer: FutureProducer,
    brokers: String,
    timeout: Duration,
    consumer_group: Option<String>,
    default_event_type: Option<String>,
    auto_offset_reset: String,
}

impl RedpandaEventBus {
    /// Create a bus with default settings.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the producer cannot be
    /// created from the broker list.
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Create a new builder for configuring the event bus.
    #[must_use]
    pub fn builder() -> RedpandaEventBusBuilder {
        RedpandaEventBusBuilder::default()
    }

    /// Broker list this bus connects to
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }
}

impl std::fmt::Debug for RedpandaEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedpandaEventBus")
            .field("brokers", &self.brokers)
            .field("timeout", &self.timeout)
            .field("consumer_group", &self.consumer_group)
            .field("default_event_type", &self.default_event_type)
            .field("auto_offset_reset", &self.auto_offset_reset)
            .finish_non_exhaustive()
    }
}

/// Builder for a [`RedpandaEventBus`].
///
/// # Example
///
/// ```no_run
/// use airport_redpanda::RedpandaEventBus;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let event_bus = RedpandaEventBus::builder()
///     .brokers("localhost:9092,localhost:9093")
///     .producer_acks("all")
///     .timeout(Duration::from_secs(10))
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RedpandaEventBusBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    default_event_type: Option<String>,
    auto_offset_reset: Option<String>,
}

impl RedpandaEventBusBuilder {
    /// Comma-separated broker addresses (e.g. `"localhost:9092"`)
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Producer acknowledgment mode: `"0"`, `"1"` or `"all"`.
    ///
    /// Default: `"all"`
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Producer send timeout.
    ///
    /// Default: 5 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Consumer group for subscriptions.
    ///
    /// Instances sharing a group split the partitions between them. When unset
    /// the group is derived from the subscribed topics.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// Event type for consumed records that carry no `event-type` header.
    ///
    /// Set it when a topic is fed by producers outside this workspace that
    /// publish bare JSON. Without it such records are undecodable.
    #[must_use]
    pub fn default_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.default_event_type = Some(event_type.into());
        self
    }

    /// Where a new consumer group starts reading: `"earliest"` or `"latest"`.
    ///
    /// Default: `"earliest"`, so a freshly deployed consumer does not skip
    /// baggage events published before its first start.
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the [`RedpandaEventBus`].
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if no brokers are set or
    /// the producer cannot be created.
    pub fn build(self) -> Result<RedpandaEventBus, EventBusError> {
        let brokers = self.brokers.ok_or_else(|| {
            EventBusError::ConnectionFailed("Brokers not configured".to_string())
        })?;
        let acks = self.producer_acks.unwrap_or_else(|| "all".to_string());
        let timeout = self.timeout.unwrap_or(Duration::from_secs(5));

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .set("acks", &acks)
            .create()
            .map_err(|e| {
                EventBusError::ConnectionFailed(format!("Failed to create producer: {e}"))
            })?;

        let auto_offset_reset = self
            .auto_offset_reset
            .unwrap_or_else(|| DEFAULT_OFFSET_RESET.to_string());

        tracing::info!(
            brokers = %brokers,
            acks = %acks,
            default_event_type = ?self.default_event_type,
            auto_offset_reset = %auto_offset_reset,
            "RedpandaEventBus created"
        );

        Ok(RedpandaEventBus {
            producer,
            brokers,
            timeout,
            consumer_group: self.consumer_group,
            default_event_type: self.default_event_type,
            auto_offset_reset,
        })
    }
}

/// Rebuild a [`SerializedEvent`] from the parts of a Kafka message.
///
/// The event type comes from the `event-type` header, falling back to
/// `default_type`.
///
/// # Errors
///
/// Returns [`EventBusError::Undecodable`], carrying whatever payload there
/// was, when the message has no payload, no usable event type, or metadata
/// that is not JSON.
pub fn decode_message(
    type_header: Option<&[u8]>,
    default_type: Option<&str>,
    metadata_header: Option<&[u8]>,
    payload: Option<&[u8]>,
) -> Result<SerializedEvent, EventBusError> {
    let undecodable = |reason: String| EventBusError::Undecodable {
        reason,
        data: payload.map(<[u8]>::to_vec).unwrap_or_default(),
    };

    let data = payload.ok_or_else(|| undecodable("Message has no payload".to_string()))?;

    let event_type = match type_header {
        Some(bytes) => std::str::from_utf8(bytes)
            .map_err(|_| undecodable("Event type header is not UTF-8".to_string()))?,
        None => default_type.ok_or_else(|| undecodable("Message carries no event type".to_string()))?,
    };
    if event_type.is_empty() {
        return Err(undecodable("Event type is empty".to_string()));
    }

    let metadata = metadata_header
        .map(serde_json::from_slice::<serde_json::Value>)
        .transpose()
        .map_err(|e| undecodable(format!("Invalid metadata: {e}")))?;

    Ok(SerializedEvent::new(
        event_type.to_string(),
        data.to_vec(),
        metadata,
    ))
}

fn header_value<'a, H: Headers>(headers: Option<&'a H>, name: &str) -> Option<&'a [u8]> {
    headers?
        .iter()
        .find(|header| header.key == name)
        .and_then(|header| header.value)
}

impl EventBus for RedpandaEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let event = event.clone();
        let timeout = self.timeout;

        Box::pin(async move {
            let mut headers = OwnedHeaders::new().insert(Header {
                key: EVENT_TYPE_HEADER,
                value: Some(event.event_type.as_bytes()),
            });
            let metadata = event
                .metadata
                .as_ref()
                .map(serde_json::to_vec)
                .transpose()
                .map_err(|e| EventBusError::PublishFailed {
                    topic: topic.clone(),
                    reason: format!("Failed to encode metadata: {e}"),
                })?;
            if let Some(metadata) = &metadata {
                headers = headers.insert(Header {
                    key: METADATA_HEADER,
                    value: Some(metadata.as_slice()),
                });
            }

            let record = FutureRecord::to(&topic)
                .payload(&event.data)
                .key(event.event_type.as_bytes())
                .headers(headers);

            match self.producer.send(record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %topic,
                        partition,
                        offset,
                        event_type = %event.event_type,
                        "Event published"
                    );
                    Ok(())
                },
                Err((kafka_error, _)) => {
                    tracing::error!(topic = %topic, error = %kafka_error, "Failed to publish event");
                    Err(EventBusError::PublishFailed {
                        topic,
                        reason: kafka_error.to_string(),
                    })
                },
            }
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();
        let brokers = self.brokers.clone();
        let consumer_group = self.consumer_group.clone();
        let default_event_type = self.default_event_type.clone();
        let auto_offset_reset = self.auto_offset_reset.clone();

        Box::pin(async move {
            if topics.is_empty() {
                return Err(EventBusError::SubscriptionFailed {
                    topics,
                    reason: "no topics given".to_string(),
                });
            }

            let consumer_group_id = consumer_group.unwrap_or_else(|| {
                let mut sorted = topics.clone();
                sorted.sort();
                format!("airport-{}", sorted.join("-"))
            });

            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &consumer_group_id)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to create consumer: {e}"),
                })?;

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer
                .subscribe(&topic_refs)
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("Failed to subscribe to topics: {e}"),
                })?;

            tracing::info!(
                topics = ?topics,
                consumer_group = %consumer_group_id,
                auto_offset_reset = %auto_offset_reset,
                "Subscribed to topics"
            );

            let stream = async_stream::stream! {
                use futures::StreamExt;
                use rdkafka::consumer::CommitMode;

                let mut messages = consumer.stream();

                while let Some(next) = messages.next().await {
                    match next {
                        Ok(message) => {
                            let event = {
                                let headers = message.headers();
                                decode_message(
                                    header_value(headers, EVENT_TYPE_HEADER),
                                    default_event_type.as_deref(),
                                    header_value(headers, METADATA_HEADER),
                                    message.payload(),
                                )
                            };

                            match &event {
                                Ok(event) => tracing::trace!(
                                    topic = message.topic(),
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    event_type = %event.event_type,
                                    "Received event"
                                ),
                                Err(e) => tracing::warn!(
                                    topic = message.topic(),
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    error = %e,
                                    "Received undecodable message"
                                ),
                            }

                            yield event;

                            // Resumed only when the subscriber asks for the next item.
                            if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                                tracing::warn!(
                                    topic = message.topic(),
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    error = %e,
                                    "Failed to commit offset (message may be redelivered)"
                                );
                            }
                        },
                        Err(e) => {
                            yield Err(EventBusError::TransportError(format!(
                                "Failed to receive message: {e}"
                            )));
                        },
                    }
                }

                tracing::debug!("Consumer stream exiting");
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}
