use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use serde_json::Value as JsonValue;
use tracing::info;
use uuid::Uuid;

use crate::{
    clients::queue::Queue,
    models::{
        audit::AuditEvent,
        channel::Channel,
        message::{
            ChannelPayload, EmailMessage, PushMessage, ResolvedRecipient, SmsMessage,
            default_sender, default_sender_id, default_subject,
        },
        request::{EmailRequest, PushRequest, SmsRequest},
        response::DispatchResponse,
    },
    pipeline::{audit::AuditRecorder, otp::OtpService, resolver::ContactResolver},
};

const AUDIT_TYPE: &str = "prepare-notification";

/// The inbound-facing stage: resolves recipients, routes the message onto
/// the channel's queue, and emits exactly one audit event per invocation,
/// whatever the outcome.
#[derive(Clone)]
pub struct Dispatcher {
    resolver: ContactResolver,
    otp: OtpService,
    audit: AuditRecorder,
    email_queue: Arc<dyn Queue>,
    sms_queue: Arc<dyn Queue>,
    push_queue: Arc<dyn Queue>,
}

impl Dispatcher {
    pub fn new(
        resolver: ContactResolver,
        otp: OtpService,
        audit: AuditRecorder,
        email_queue: Arc<dyn Queue>,
        sms_queue: Arc<dyn Queue>,
        push_queue: Arc<dyn Queue>,
    ) -> Self {
        Self {
            resolver,
            otp,
            audit,
            email_queue,
            sms_queue,
            push_queue,
        }
    }

    pub async fn dispatch_email(
        &self,
        request: EmailRequest,
        request_body: JsonValue,
        request_id: &str,
    ) -> Result<DispatchResponse, Error> {
        let transaction_id = Uuid::new_v4().to_string();
        let to = request.to.clone();
        let transaction_type = request.transaction_type.clone();

        let build = |recipients: Vec<ResolvedRecipient>| EmailMessage {
            transaction_id: Some(transaction_id.clone()),
            request_id: Some(request_id.to_string()),
            subject: request.subject.clone().unwrap_or_else(default_subject),
            body: request.body.clone(),
            sender: request.sender.clone().unwrap_or_else(default_sender),
            recipients,
        };

        self.run(
            Channel::Email,
            &self.email_queue,
            &transaction_id,
            &to,
            transaction_type.as_deref(),
            request_body,
            request_id,
            build,
        )
        .await
    }

    pub async fn dispatch_sms(
        &self,
        request: SmsRequest,
        request_body: JsonValue,
        request_id: &str,
    ) -> Result<DispatchResponse, Error> {
        let transaction_id = Uuid::new_v4().to_string();
        let to = request.to.clone();
        let transaction_type = request.transaction_type.clone();

        let build = |recipients: Vec<ResolvedRecipient>| SmsMessage {
            transaction_id: Some(transaction_id.clone()),
            request_id: Some(request_id.to_string()),
            message: request.message.clone(),
            sender_id: request.sender_id.clone().unwrap_or_else(default_sender_id),
            recipients,
        };

        self.run(
            Channel::Sms,
            &self.sms_queue,
            &transaction_id,
            &to,
            transaction_type.as_deref(),
            request_body,
            request_id,
            build,
        )
        .await
    }

    pub async fn dispatch_push(
        &self,
        request: PushRequest,
        request_body: JsonValue,
        request_id: &str,
    ) -> Result<DispatchResponse, Error> {
        let transaction_id = Uuid::new_v4().to_string();
        let to = request.to.clone();
        let transaction_type = request.transaction_type.clone();

        let build = |recipients: Vec<ResolvedRecipient>| PushMessage {
            transaction_id: Some(transaction_id.clone()),
            request_id: Some(request_id.to_string()),
            title: request
                .title
                .clone()
                .unwrap_or_else(|| "Notification".to_string()),
            body: request.body.clone(),
            priority: request
                .priority
                .clone()
                .unwrap_or_else(|| "normal".to_string()),
            data: request.data.clone(),
            recipients,
        };

        self.run(
            Channel::Push,
            &self.push_queue,
            &transaction_id,
            &to,
            transaction_type.as_deref(),
            request_body,
            request_id,
            build,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn run<P, F>(
        &self,
        channel: Channel,
        queue: &Arc<dyn Queue>,
        transaction_id: &str,
        to: &[String],
        transaction_type: Option<&str>,
        request_body: JsonValue,
        request_id: &str,
        build: F,
    ) -> Result<DispatchResponse, Error>
    where
        P: ChannelPayload,
        F: FnOnce(Vec<ResolvedRecipient>) -> P,
    {
        let recipients = self.resolve_all(to, channel).await;

        if let Some(transaction_type) = transaction_type {
            self.issue_otps(&recipients, transaction_type).await;
        }

        let outcome = self.publish(queue, build, &recipients).await;

        let output = match &outcome {
            Ok(()) => serde_json::json!({ "recipients": &recipients }),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        };

        self.audit
            .record(
                AuditEvent::new(transaction_id, AUDIT_TYPE, channel.route(), request_id)
                    .with_request_body(request_body)
                    .with_output(output),
            )
            .await;

        outcome?;

        info!(
            transaction_id,
            channel = %channel,
            requested = to.len(),
            resolved = recipients.len(),
            "Notification dispatched"
        );

        Ok(DispatchResponse {
            message: "Notification queued".to_string(),
            recipients,
        })
    }

    /// Resolve every target in input order, keeping only the ones that
    /// produced an address.
    async fn resolve_all(&self, to: &[String], channel: Channel) -> Vec<ResolvedRecipient> {
        let mut recipients = Vec::new();

        for user_id in to {
            let Some(address) = self.resolver.resolve(user_id, channel).await else {
                continue;
            };

            let recipient = match channel {
                Channel::Email => ResolvedRecipient::email(user_id, address),
                Channel::Sms => ResolvedRecipient::phone(user_id, address),
                Channel::Push => ResolvedRecipient::device_token(user_id, address),
            };

            recipients.push(recipient);
        }

        recipients
    }

    /// Issue one code per resolved recipient. Fire-and-forget; failures are
    /// already logged inside the service.
    async fn issue_otps(&self, recipients: &[ResolvedRecipient], transaction_type: &str) {
        for recipient in recipients {
            let code = self.otp.generate();
            self.otp
                .store(&recipient.user_id, &code, transaction_type)
                .await;
        }
    }

    async fn publish<P, F>(
        &self,
        queue: &Arc<dyn Queue>,
        build: F,
        recipients: &[ResolvedRecipient],
    ) -> Result<(), Error>
    where
        P: ChannelPayload,
        F: FnOnce(Vec<ResolvedRecipient>) -> P,
    {
        if recipients.is_empty() {
            return Ok(());
        }

        let message = build(recipients.to_vec());
        let payload = serde_json::to_string(&message)
            .map_err(|e| anyhow!("Failed to serialize routed message: {}", e))?;

        queue.send(&payload).await
    }
}
