use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use tracing::debug;

use crate::{clients::database::DatabaseClient, models::channel::Channel};

/// Lookup of a user's delivery address for one channel. `Ok(None)` means the
/// user is unknown or has no address on file; only backend faults are errors.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn contact(&self, user_id: &str, channel: Channel) -> Result<Option<String>, Error>;
}

pub struct PostgresDirectory {
    db: DatabaseClient,
}

impl PostgresDirectory {
    pub fn new(db: DatabaseClient) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PostgresDirectory {
    async fn contact(&self, user_id: &str, channel: Channel) -> Result<Option<String>, Error> {
        // address_field is a fixed identifier per channel, never user input
        let query = format!(
            "SELECT {} FROM users WHERE user_id = $1",
            channel.address_field()
        );

        let row = self
            .db
            .client()
            .query_opt(&query, &[&user_id])
            .await
            .map_err(|e| anyhow!("Directory lookup failed for {}: {}", user_id, e))?;

        let address = match row {
            Some(row) => row
                .try_get::<_, Option<String>>(0)
                .map_err(|e| anyhow!("Directory row decode failed: {}", e))?,
            None => None,
        };

        debug!(
            user_id,
            channel = %channel,
            found = address.is_some(),
            "Directory lookup"
        );

        Ok(address)
    }
}
