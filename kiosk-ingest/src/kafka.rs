use std::sync::{Arc, Weak};

use rdkafka::{
    consumer::{Consumer, StreamConsumer},
    error::KafkaError,
    ClientConfig, Message,
};
use serde_json::Value;

use crate::config::{ConsumerConfig, KafkaConfig};

/// Thin wrapper over an rdkafka `StreamConsumer` subscribed to the kiosk
/// event topic. Offsets are stored manually so an event is only committed
/// once its transaction row has been persisted (or it has been rejected
/// with a logged reason).
#[derive(Clone)]
pub struct KioskEventConsumer {
    inner: Arc<Inner>,
}

struct Inner {
    consumer: StreamConsumer,
    topic: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RecvErr {
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("received empty payload")]
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum OffsetErr {
    #[error("kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("consumer gone")]
    Gone,
}

impl KioskEventConsumer {
    pub fn new(
        kafka_config: &KafkaConfig,
        consumer_config: &ConsumerConfig,
    ) -> Result<Self, KafkaError> {
        let mut client_config = ClientConfig::from(kafka_config);
        client_config
            .set("group.id", &consumer_config.kafka_consumer_group)
            .set(
                "auto.offset.reset",
                &consumer_config.kafka_consumer_offset_reset,
            )
            .set("enable.auto.offset.store", "false");

        let consumer: StreamConsumer = client_config.create()?;
        consumer.subscribe(&[consumer_config.kafka_consumer_topic.as_str()])?;

        let inner = Inner {
            consumer,
            topic: consumer_config.kafka_consumer_topic.clone(),
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Receives the next kiosk payload as untyped JSON, suitable for the
    /// validation rule chain. Empty and unparseable payloads are poison
    /// pills: their offsets are auto-stored so they are never redelivered.
    pub async fn recv_payload(&self) -> Result<(Value, Offset), RecvErr> {
        let message = self.inner.consumer.recv().await?;

        let offset = Offset {
            handle: Arc::downgrade(&self.inner),
            partition: message.partition(),
            offset: message.offset(),
        };

        let Some(payload) = message.payload() else {
            offset.store().map_err(kafka_only)?;
            return Err(RecvErr::Empty);
        };

        let payload = match serde_json::from_slice(payload) {
            Ok(p) => p,
            Err(e) => {
                offset.store().map_err(kafka_only)?;
                return Err(RecvErr::Serde(e));
            }
        };

        Ok((payload, offset))
    }
}

fn kafka_only(e: OffsetErr) -> RecvErr {
    match e {
        OffsetErr::Kafka(e) => RecvErr::Kafka(e),
        // The consumer owns the Inner we just received from; it cannot be
        // gone while a message is in flight.
        OffsetErr::Gone => RecvErr::Empty,
    }
}

pub struct Offset {
    handle: Weak<Inner>,
    partition: i32,
    offset: i64,
}

impl Offset {
    pub fn store(self) -> Result<(), OffsetErr> {
        let inner = self.handle.upgrade().ok_or(OffsetErr::Gone)?;
        inner
            .consumer
            .store_offset(&inner.topic, self.partition, self.offset)?;
        Ok(())
    }
}
