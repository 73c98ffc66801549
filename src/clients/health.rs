use std::{collections::HashMap, time::Instant};

use chrono::{SecondsFormat, Utc};
use lapin::{Connection, ConnectionProperties};
use tracing::{debug, warn};

use crate::{
    clients::{
        blob::{BlobStore, HttpBlobStore},
        database::DatabaseClient,
    },
    config::Config,
    models::health::{HealthCheckResponse, HealthStatus, ServiceHealth},
};

pub struct HealthChecker {
    config: Config,
}

impl HealthChecker {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        let db_health = self.check_database().await;
        checks.insert("database".to_string(), db_health);

        let broker_health = self.check_broker().await;
        checks.insert("message_broker".to_string(), broker_health);

        let template_health = self.check_template_store().await;
        checks.insert("template_store".to_string(), template_health);

        let overall_status = self.determine_overall_status(&checks);

        HealthCheckResponse {
            status: overall_status,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            checks,
        }
    }

    async fn check_database(&self) -> ServiceHealth {
        let start = Instant::now();

        match DatabaseClient::connect(&self.config.database_url).await {
            Ok(client) => match client.health_check().await {
                Ok(_) => {
                    let elapsed = start.elapsed().as_millis() as u64;
                    debug!(response_time_ms = elapsed, "Database health check passed");
                    ServiceHealth::healthy(elapsed)
                }
                Err(e) => {
                    warn!(error = %e, "Database health check failed");
                    ServiceHealth::unhealthy(format!("Health check query failed: {}", e))
                }
            },
            Err(e) => {
                warn!(error = %e, "Database connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    async fn check_broker(&self) -> ServiceHealth {
        let start = Instant::now();

        match Connection::connect(&self.config.rabbitmq_url, ConnectionProperties::default()).await
        {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "Broker health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "Broker connection failed");
                ServiceHealth::unhealthy(format!("Connection failed: {}", e))
            }
        }
    }

    async fn check_template_store(&self) -> ServiceHealth {
        let start = Instant::now();

        let store = match HttpBlobStore::new(
            &self.config.template_store_url,
            self.config.retry_config(),
        ) {
            Ok(store) => store,
            Err(e) => {
                return ServiceHealth::unhealthy(format!("Client creation failed: {}", e));
            }
        };

        match store.fetch(&self.config.email_template_key).await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(
                    response_time_ms = elapsed,
                    "Template store health check passed"
                );
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "Template store health check failed");
                ServiceHealth::unhealthy(format!("Template fetch failed: {}", e))
            }
        }
    }

    fn determine_overall_status(&self, checks: &HashMap<String, ServiceHealth>) -> HealthStatus {
        let has_unhealthy = checks
            .values()
            .any(|health| health.status == HealthStatus::Unhealthy);

        let has_degraded = checks
            .values()
            .any(|health| health.status == HealthStatus::Degraded);

        if has_unhealthy {
            HealthStatus::Unhealthy
        } else if has_degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}
