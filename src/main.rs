use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use dispatch_service::{
    api::{AppState, run_api_server},
    authz::RequestAuthorizer,
    clients::{
        audit_store::PostgresAuditStore,
        blob::{BlobStore, HttpBlobStore},
        database::DatabaseClient,
        directory::PostgresDirectory,
        health::HealthChecker,
        otp_store::PostgresOtpStore,
        policy::{HttpPolicyClient, PolicyDecisionPoint},
        queue::{AmqpQueue, Queue},
        token::{JwtValidator, TokenValidator},
        topic::{AmqpTopic, Topic},
    },
    config::Config,
    models::message::{ChannelPayload, EmailMessage, PushMessage, SmsMessage},
    pipeline::{
        audit::{AuditIngestor, AuditRecorder},
        dispatch::Dispatcher,
        otp::OtpService,
        relay::ChannelRelay,
        resolver::ContactResolver,
        template::TemplateRenderer,
    },
};
use lapin::{Connection, ConnectionProperties};
use tokio::time::{Duration, sleep};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::load()?;
    let wait = Duration::from_secs(config.poll_wait_seconds);

    let connection = Connection::connect(&config.rabbitmq_url, ConnectionProperties::default())
        .await
        .map_err(|e| anyhow!("Failed to connect to message broker: {}", e))?;
    let channel = connection
        .create_channel()
        .await
        .map_err(|e| anyhow!("Failed to create broker channel: {}", e))?;

    let email_queue: Arc<dyn Queue> =
        Arc::new(AmqpQueue::declare(channel.clone(), &config.email_queue_name).await?);
    let sms_queue: Arc<dyn Queue> =
        Arc::new(AmqpQueue::declare(channel.clone(), &config.sms_queue_name).await?);
    let push_queue: Arc<dyn Queue> =
        Arc::new(AmqpQueue::declare(channel.clone(), &config.push_queue_name).await?);
    let audit_queue: Arc<dyn Queue> =
        Arc::new(AmqpQueue::declare(channel.clone(), &config.audit_queue_name).await?);

    let email_topic: Arc<dyn Topic> =
        Arc::new(AmqpTopic::declare(channel.clone(), &config.email_delivery_exchange).await?);
    let sms_topic: Arc<dyn Topic> =
        Arc::new(AmqpTopic::declare(channel.clone(), &config.sms_delivery_exchange).await?);
    let push_topic: Arc<dyn Topic> =
        Arc::new(AmqpTopic::declare(channel.clone(), &config.push_delivery_exchange).await?);

    let db = DatabaseClient::connect(&config.database_url).await?;
    let directory = Arc::new(PostgresDirectory::new(db.clone()));
    let otp_store = Arc::new(PostgresOtpStore::new(db.clone()));
    let audit_store = Arc::new(PostgresAuditStore::new(db.clone()));

    let templates: Arc<dyn BlobStore> = Arc::new(HttpBlobStore::new(
        &config.template_store_url,
        config.retry_config(),
    )?);
    let validator: Arc<dyn TokenValidator> = Arc::new(JwtValidator::new(
        &config.jwt_public_key_path,
        &config.jwt_issuer,
    )?);
    let policy: Arc<dyn PolicyDecisionPoint> = Arc::new(HttpPolicyClient::new(
        &config.policy_api_url,
        config.retry_config(),
    )?);

    let audit = AuditRecorder::new(audit_queue.clone());
    let resolver = ContactResolver::new(directory);
    let otp = OtpService::new(otp_store);
    let renderer = TemplateRenderer::new(templates, &config.email_template_key);

    let dispatcher = Dispatcher::new(
        resolver,
        otp.clone(),
        audit.clone(),
        email_queue.clone(),
        sms_queue.clone(),
        push_queue.clone(),
    );

    let email_relay = ChannelRelay::<EmailMessage>::new(
        email_queue,
        email_topic,
        audit.clone(),
        Some(renderer),
        config.poll_max_messages,
        wait,
    )?;
    let sms_relay = ChannelRelay::<SmsMessage>::new(
        sms_queue,
        sms_topic,
        audit.clone(),
        None,
        config.poll_max_messages,
        wait,
    )?;
    let push_relay = ChannelRelay::<PushMessage>::new(
        push_queue,
        push_topic,
        audit.clone(),
        None,
        config.poll_max_messages,
        wait,
    )?;

    let ingestor = AuditIngestor::new(
        audit_queue.clone(),
        audit_store,
        config.poll_max_messages,
        wait,
    );

    let authorizer = RequestAuthorizer::new(validator, policy, audit.clone());

    tokio::spawn(run_relay(email_relay));
    tokio::spawn(run_relay(sms_relay));
    tokio::spawn(run_relay(push_relay));
    tokio::spawn(run_ingestor(ingestor));

    info!("Relay and audit workers started");

    let state = Arc::new(AppState {
        dispatcher,
        otp,
        authorizer,
        audit,
        health_checker: HealthChecker::new(config.clone()),
    });

    run_api_server(state, config.server_port)
        .await
        .map_err(|e| anyhow!("API server failed: {}", e))?;

    Ok(())
}

async fn run_relay<P: ChannelPayload + 'static>(relay: ChannelRelay<P>) {
    loop {
        let request_id = Uuid::new_v4().to_string();

        if let Err(e) = relay.poll_once(&request_id).await {
            error!(route = P::route(), error = %e, "Relay batch failed");
            sleep(Duration::from_secs(1)).await;
        }
    }
}

async fn run_ingestor(ingestor: AuditIngestor) {
    loop {
        let request_id = Uuid::new_v4().to_string();

        if let Err(e) = ingestor.poll_once(&request_id).await {
            error!(error = %e, "Audit ingestion batch failed");
            sleep(Duration::from_secs(1)).await;
        }
    }
}
