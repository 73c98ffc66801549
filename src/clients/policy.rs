use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    config::RetryConfig,
    models::policy::{Decision, ResourceRef},
    utils::retry_with_backoff,
};

/// External policy engine consulted when the root shortcut does not apply.
#[async_trait]
pub trait PolicyDecisionPoint: Send + Sync {
    async fn is_authorized(
        &self,
        principal: &str,
        action: &str,
        resource: &ResourceRef,
    ) -> Result<Decision, Error>;

    async fn batch_is_authorized(
        &self,
        principal: &str,
        action: &str,
        resources: &[ResourceRef],
    ) -> Result<Vec<Decision>, Error>;
}

pub struct HttpPolicyClient {
    http_client: reqwest::Client,
    base_url: String,
    retry_config: RetryConfig,
}

#[derive(Deserialize)]
struct DecisionResponse {
    decision: Decision,
}

#[derive(Deserialize)]
struct BatchDecisionResponse {
    results: Vec<DecisionResponse>,
}

impl HttpPolicyClient {
    pub fn new(base_url: &str, retry_config: RetryConfig) -> Result<Self, Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        info!(base_url, "Policy client initialized");

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_config,
        })
    }

    async fn post_decision<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        payload: serde_json::Value,
    ) -> Result<T, Error> {
        retry_with_backoff(&self.retry_config, || {
            let client = self.http_client.clone();
            let url = url.clone();
            let payload = payload.clone();

            async move {
                let response = client
                    .post(&url)
                    .json(&payload)
                    .send()
                    .await
                    .map_err(|e| e.to_string())?;

                let status = response.status();

                if status.is_success() {
                    response
                        .json::<T>()
                        .await
                        .map_err(|e| format!("Failed to parse decision response: {}", e))
                } else {
                    Err(format!("Policy endpoint returned status {}", status))
                }
            }
        })
        .await
        .map_err(|e| anyhow!("Policy decision call failed: {}", e))
    }
}

#[async_trait]
impl PolicyDecisionPoint for HttpPolicyClient {
    async fn is_authorized(
        &self,
        principal: &str,
        action: &str,
        resource: &ResourceRef,
    ) -> Result<Decision, Error> {
        debug!(principal, action, resource = %resource.entity_id, "Requesting policy decision");

        let response: DecisionResponse = self
            .post_decision(
                format!("{}/v1/decisions", self.base_url),
                serde_json::json!({
                    "principal": principal,
                    "action": action,
                    "resource": resource,
                }),
            )
            .await?;

        Ok(response.decision)
    }

    async fn batch_is_authorized(
        &self,
        principal: &str,
        action: &str,
        resources: &[ResourceRef],
    ) -> Result<Vec<Decision>, Error> {
        debug!(
            principal,
            action,
            resource_count = resources.len(),
            "Requesting batched policy decision"
        );

        let response: BatchDecisionResponse = self
            .post_decision(
                format!("{}/v1/decisions/batch", self.base_url),
                serde_json::json!({
                    "principal": principal,
                    "action": action,
                    "resources": resources,
                }),
            )
            .await?;

        Ok(response
            .results
            .into_iter()
            .map(|result| result.decision)
            .collect())
    }
}
