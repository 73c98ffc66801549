use std::{marker::PhantomData, sync::Arc};

use anyhow::{Error, Result, anyhow};
use serde_json::Value as JsonValue;
use tokio::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    clients::{queue::Queue, topic::Topic},
    models::{audit::AuditEvent, message::ChannelPayload},
    pipeline::{audit::AuditRecorder, template::TemplateRenderer},
};

/// Per-batch relay result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Messages published to the final-delivery topic.
    pub published: usize,
    /// Messages discarded for having no recipients.
    pub discarded: usize,
}

/// Moves routed messages from a channel's queue (or a topic delivery) to its
/// final-delivery topic, templating email bodies on the way through.
///
/// Pull mode acknowledges each message only after its downstream publish
/// succeeds, so a failed publish leaves the message available for
/// redelivery. A message with no recipients can never deliver and is
/// acknowledged immediately. One audit event covers the whole batch.
pub struct ChannelRelay<P: ChannelPayload> {
    source: Arc<dyn Queue>,
    destination: Arc<dyn Topic>,
    audit: AuditRecorder,
    renderer: Option<TemplateRenderer>,
    max_messages: usize,
    wait: Duration,
    _payload: PhantomData<P>,
}

impl<P: ChannelPayload> ChannelRelay<P> {
    pub fn new(
        source: Arc<dyn Queue>,
        destination: Arc<dyn Topic>,
        audit: AuditRecorder,
        renderer: Option<TemplateRenderer>,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Self, Error> {
        if P::needs_template() && renderer.is_none() {
            return Err(anyhow!("Relay for {} requires a template renderer", P::route()));
        }

        Ok(Self {
            source,
            destination,
            audit,
            renderer,
            max_messages,
            wait,
            _payload: PhantomData,
        })
    }

    /// Pull-driven entry: one bounded poll of the upstream queue. An empty
    /// poll is a no-op and does not audit.
    pub async fn poll_once(&self, request_id: &str) -> Result<RelayOutcome, Error> {
        let messages = self.source.receive(self.max_messages, self.wait).await?;

        if messages.is_empty() {
            return Ok(RelayOutcome::default());
        }

        let bodies: Vec<String> = messages.iter().map(|m| m.body.clone()).collect();
        let receipts: Vec<Option<&str>> = messages
            .iter()
            .map(|m| Some(m.receipt.as_str()))
            .collect();

        self.process_batch(&bodies, &receipts, request_id).await
    }

    /// Push-driven entry: one topic delivery is one batch. Consumption needs
    /// no explicit acknowledgment, so empty-recipient messages are skipped
    /// rather than deleted.
    pub async fn handle_delivery(
        &self,
        bodies: &[String],
        request_id: &str,
    ) -> Result<RelayOutcome, Error> {
        if bodies.is_empty() {
            warn!(route = P::route(), "Delivery with no messages");
            return Ok(RelayOutcome::default());
        }

        let receipts: Vec<Option<&str>> = vec![None; bodies.len()];

        self.process_batch(bodies, &receipts, request_id).await
    }

    async fn process_batch(
        &self,
        bodies: &[String],
        receipts: &[Option<&str>],
        request_id: &str,
    ) -> Result<RelayOutcome, Error> {
        let batch_id = Uuid::new_v4().to_string();
        let request_body = echo_bodies(bodies);

        let mut processed_entries = Vec::new();
        let mut outcome = RelayOutcome::default();

        let result = self
            .relay_messages(bodies, receipts, &batch_id, &mut processed_entries, &mut outcome)
            .await;

        let output = match &result {
            Ok(()) => serde_json::json!({ "processed_messages": processed_entries }),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };

        self.audit
            .record(
                AuditEvent::new(batch_id.as_str(), P::audit_type(), P::route(), request_id)
                    .with_request_body(request_body)
                    .with_output(output),
            )
            .await;

        result?;

        info!(
            batch_id = %batch_id,
            route = P::route(),
            published = outcome.published,
            discarded = outcome.discarded,
            "Relay batch completed"
        );

        Ok(outcome)
    }

    async fn relay_messages(
        &self,
        bodies: &[String],
        receipts: &[Option<&str>],
        batch_id: &str,
        processed_entries: &mut Vec<JsonValue>,
        outcome: &mut RelayOutcome,
    ) -> Result<(), Error> {
        let template = match &self.renderer {
            Some(renderer) if P::needs_template() => Some(renderer.load().await?),
            _ => None,
        };

        for (body, receipt) in bodies.iter().zip(receipts) {
            let payload: P = serde_json::from_str(body)
                .map_err(|e| anyhow!("Malformed routed message: {}", e))?;

            if payload.recipients().is_empty() {
                warn!(route = P::route(), "Discarding message with no recipients");

                if let Some(receipt) = receipt {
                    self.source.delete(receipt).await?;
                }

                outcome.discarded += 1;
                continue;
            }

            let transaction_id = payload
                .transaction_id()
                .map(str::to_string)
                .unwrap_or_else(|| batch_id.to_string());

            let processed = payload.to_processed(template.as_ref())?;
            let processed_body = serde_json::to_string(&processed)
                .map_err(|e| anyhow!("Failed to serialize processed message: {}", e))?;

            self.destination
                .publish(payload.publish_subject().as_deref(), &processed_body)
                .await?;

            // publish happened, now the upstream copy can go
            if let Some(receipt) = receipt {
                self.source.delete(receipt).await?;
            }

            let mut entry = serde_json::Map::new();
            entry.insert(P::processed_key().to_string(), processed);
            entry.insert(
                "transaction_id".to_string(),
                JsonValue::String(transaction_id),
            );

            processed_entries.push(JsonValue::Object(entry));
            outcome.published += 1;
        }

        Ok(())
    }
}

fn echo_bodies(bodies: &[String]) -> JsonValue {
    JsonValue::Array(
        bodies
            .iter()
            .map(|body| {
                serde_json::from_str(body).unwrap_or_else(|_| JsonValue::String(body.clone()))
            })
            .collect(),
    )
}
