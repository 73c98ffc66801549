use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use tracing::debug;

use crate::{clients::database::DatabaseClient, models::audit::AuditEvent};

/// Permanent audit storage. Insert-only; events are never updated or deleted
/// after ingestion, and duplicates from queue redelivery are acceptable.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> Result<(), Error>;
}

pub struct PostgresAuditStore {
    db: DatabaseClient,
}

impl PostgresAuditStore {
    pub fn new(db: DatabaseClient) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditStore for PostgresAuditStore {
    async fn append(&self, event: &AuditEvent) -> Result<(), Error> {
        self.db
            .client()
            .execute(
                "INSERT INTO audit_events \
                 (transaction_id, event_type, recorded_at, path, request_body, transaction_output, request_id) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
                &[
                    &event.transaction_id,
                    &event.event_type,
                    &event.timestamp,
                    &event.path,
                    &event.request_body,
                    &event.transaction_output,
                    &event.request_id,
                ],
            )
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to persist audit event for transaction {}: {}",
                    event.transaction_id,
                    e
                )
            })?;

        debug!(
            transaction_id = %event.transaction_id,
            event_type = %event.event_type,
            "Audit event persisted"
        );

        Ok(())
    }
}
