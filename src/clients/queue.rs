use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use lapin::{
    BasicProperties, Channel,
    options::{BasicAckOptions, BasicGetOptions, BasicPublishOptions, QueueDeclareOptions},
    types::FieldTable,
};
use tokio::time::{Duration, Instant, sleep};
use tracing::debug;

/// Durable point-to-point channel with at-least-once delivery. A received
/// message stays invisible but undeleted until `delete` acknowledges it;
/// an unacknowledged message becomes available again for redelivery.
#[async_trait]
pub trait Queue: Send + Sync {
    async fn send(&self, body: &str) -> Result<(), Error>;

    /// Fetch up to `max_messages`, waiting up to `wait` for the first one.
    async fn receive(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>, Error>;

    async fn delete(&self, receipt: &str) -> Result<(), Error>;
}

#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub receipt: String,
    pub body: String,
}

pub struct AmqpQueue {
    channel: Channel,
    queue_name: String,
}

impl AmqpQueue {
    pub async fn declare(channel: Channel, queue_name: &str) -> Result<Self, Error> {
        channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare queue {}: {}", queue_name, e))?;

        debug!(queue = queue_name, "Queue declared");

        Ok(Self {
            channel,
            queue_name: queue_name.to_string(),
        })
    }
}

#[async_trait]
impl Queue for AmqpQueue {
    async fn send(&self, body: &str) -> Result<(), Error> {
        self.channel
            .basic_publish(
                "",
                &self.queue_name,
                BasicPublishOptions::default(),
                body.as_bytes(),
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| anyhow!("Failed to publish to queue {}: {}", self.queue_name, e))?;

        Ok(())
    }

    async fn receive(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>, Error> {
        let deadline = Instant::now() + wait;
        let mut messages = Vec::new();

        loop {
            while messages.len() < max_messages {
                let fetched = self
                    .channel
                    .basic_get(&self.queue_name, BasicGetOptions { no_ack: false })
                    .await
                    .map_err(|e| anyhow!("Failed to fetch from queue {}: {}", self.queue_name, e))?;

                match fetched {
                    Some(message) => messages.push(QueueMessage {
                        receipt: message.delivery.delivery_tag.to_string(),
                        body: String::from_utf8_lossy(&message.delivery.data).into_owned(),
                    }),
                    None => break,
                }
            }

            if !messages.is_empty() || Instant::now() >= deadline {
                break;
            }

            sleep(Duration::from_millis(250)).await;
        }

        debug!(
            queue = %self.queue_name,
            count = messages.len(),
            "Queue poll completed"
        );

        Ok(messages)
    }

    async fn delete(&self, receipt: &str) -> Result<(), Error> {
        let delivery_tag: u64 = receipt
            .parse()
            .map_err(|_| anyhow!("Invalid receipt handle: {}", receipt))?;

        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to acknowledge message: {}", e))?;

        Ok(())
    }
}
