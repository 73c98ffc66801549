use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use chrono::Utc;
use tokio::time::Duration;
use tracing::{info, warn};

use crate::{
    clients::{audit_store::AuditStore, queue::Queue},
    models::audit::{AuditEvent, audit_timestamp},
};

/// Emits audit events onto the audit queue. Emission is best-effort and
/// never fails the surrounding transaction; a lost event is logged, not
/// propagated.
#[derive(Clone)]
pub struct AuditRecorder {
    queue: Arc<dyn Queue>,
}

impl AuditRecorder {
    pub fn new(queue: Arc<dyn Queue>) -> Self {
        Self { queue }
    }

    pub async fn record(&self, event: AuditEvent) {
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    transaction_id = %event.transaction_id,
                    error = %e,
                    "Failed to serialize audit event"
                );
                return;
            }
        };

        if let Err(e) = self.queue.send(&payload).await {
            warn!(
                transaction_id = %event.transaction_id,
                error = %e,
                "Failed to emit audit event"
            );
        } else {
            info!(
                transaction_id = %event.transaction_id,
                event_type = %event.event_type,
                "Audit event emitted"
            );
        }
    }
}

/// Drains the audit queue into the permanent store. Each message is deleted
/// individually, immediately after its event persists, so a crash mid-batch
/// reprocesses only the not-yet-deleted remainder.
pub struct AuditIngestor {
    source: Arc<dyn Queue>,
    store: Arc<dyn AuditStore>,
    max_messages: usize,
    wait: Duration,
}

impl AuditIngestor {
    pub fn new(
        source: Arc<dyn Queue>,
        store: Arc<dyn AuditStore>,
        max_messages: usize,
        wait: Duration,
    ) -> Self {
        Self {
            source,
            store,
            max_messages,
            wait,
        }
    }

    /// One bounded poll. Returns the number of events persisted; an error
    /// aborts the remainder of the batch and leaves it on the queue.
    pub async fn poll_once(&self, request_id: &str) -> Result<usize, Error> {
        let messages = self.source.receive(self.max_messages, self.wait).await?;

        if messages.is_empty() {
            return Ok(0);
        }

        info!(count = messages.len(), "Ingesting audit events");

        let mut persisted = 0;

        for message in &messages {
            let mut event: AuditEvent = serde_json::from_str(&message.body)
                .map_err(|e| anyhow!("Malformed audit message: {}", e))?;

            // the ingestion timestamp is authoritative, not the producer's
            event.timestamp = audit_timestamp(Utc::now());
            event.request_id = request_id.to_string();

            self.store.append(&event).await?;
            self.source.delete(&message.receipt).await?;

            persisted += 1;
        }

        Ok(persisted)
    }
}
