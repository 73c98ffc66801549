use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct Config {
    pub rabbitmq_url: String,
    pub email_queue_name: String,
    pub sms_queue_name: String,
    pub push_queue_name: String,
    pub audit_queue_name: String,

    pub email_delivery_exchange: String,
    pub sms_delivery_exchange: String,
    pub push_delivery_exchange: String,

    pub database_url: String,

    pub template_store_url: String,
    pub email_template_key: String,

    pub policy_api_url: String,

    pub jwt_public_key_path: String,
    pub jwt_issuer: String,

    pub poll_max_messages: usize,
    pub poll_wait_seconds: u64,

    pub max_retry_attempts: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub retry_backoff_multiplier: u64,

    pub server_port: u16,
}

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: u64,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let config = envy::from_env::<Self>()
            .map_err(|_| anyhow!("Invalid or missing environmental variable"))?;
        Ok(config)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retry_attempts,
            initial_delay_ms: self.initial_retry_delay_ms,
            max_delay_ms: self.max_retry_delay_ms,
            backoff_multiplier: self.retry_backoff_multiplier,
        }
    }
}
