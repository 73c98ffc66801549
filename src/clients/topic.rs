use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use lapin::{
    BasicProperties, Channel, ExchangeKind,
    options::{BasicPublishOptions, ExchangeDeclareOptions},
    types::{FieldTable, ShortString},
};
use tracing::debug;

/// Fan-out channel toward the final-delivery subsystem. Publishing is
/// fire-and-forget for the pipeline; subscribers own their own consumption.
#[async_trait]
pub trait Topic: Send + Sync {
    async fn publish(&self, subject: Option<&str>, body: &str) -> Result<(), Error>;
}

pub struct AmqpTopic {
    channel: Channel,
    exchange: String,
}

impl AmqpTopic {
    pub async fn declare(channel: Channel, exchange: &str) -> Result<Self, Error> {
        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to declare exchange {}: {}", exchange, e))?;

        debug!(exchange, "Fanout exchange declared");

        Ok(Self {
            channel,
            exchange: exchange.to_string(),
        })
    }
}

#[async_trait]
impl Topic for AmqpTopic {
    async fn publish(&self, subject: Option<&str>, body: &str) -> Result<(), Error> {
        let mut properties = BasicProperties::default().with_delivery_mode(2);
        if let Some(subject) = subject {
            properties = properties.with_type(ShortString::from(subject.to_string()));
        }

        self.channel
            .basic_publish(
                &self.exchange,
                "",
                BasicPublishOptions::default(),
                body.as_bytes(),
                properties,
            )
            .await
            .map_err(|e| anyhow!("Failed to publish to exchange {}: {}", self.exchange, e))?;

        Ok(())
    }
}
