use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use tokio_postgres::{Client, NoTls};
use tracing::{error, info};

/// Shared PostgreSQL connection. `tokio_postgres` drives the socket on a
/// background task; the client itself is cheap to clone and share.
#[derive(Clone)]
pub struct DatabaseClient {
    client: Arc<Client>,
}

impl DatabaseClient {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "Database connection terminated");
            }
        });

        info!("PostgreSQL connection established");

        Ok(Self {
            client: Arc::new(client),
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        self.client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| anyhow!("Database health check failed: {}", e))?;

        Ok(())
    }
}
