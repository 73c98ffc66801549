use std::collections::HashMap;

use anyhow::{Error, Result, anyhow};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;

use crate::pipeline::template::EmailTemplate;

/// A user id paired with the channel address it resolved to. The address
/// keeps its channel-specific field name on the wire (`email` / `phone` /
/// `device_token`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRecipient {
    pub user_id: String,
    #[serde(flatten)]
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Address {
    #[serde(rename = "email")]
    Email(String),
    #[serde(rename = "phone")]
    Phone(String),
    #[serde(rename = "device_token")]
    DeviceToken(String),
}

impl ResolvedRecipient {
    pub fn email(user_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            address: Address::Email(address.into()),
        }
    }

    pub fn phone(user_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            address: Address::Phone(address.into()),
        }
    }

    pub fn device_token(user_id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            address: Address::DeviceToken(address.into()),
        }
    }
}

/// Routed message payloads. One struct per channel; all share the envelope
/// fields (transaction id, request correlation id, recipients) and tolerate
/// absent optional fields with fixed defaults, since producers and consumers
/// evolve independently.
pub trait ChannelPayload: Serialize + DeserializeOwned + Send + Sync {
    fn audit_type() -> &'static str;
    fn route() -> &'static str;
    /// Key under which the processed payload is echoed into the batch audit.
    fn processed_key() -> &'static str;
    fn needs_template() -> bool {
        false
    }

    fn transaction_id(&self) -> Option<&str>;
    fn recipients(&self) -> &[ResolvedRecipient];
    /// Subject attached to the final-delivery publish, when the channel has one.
    fn publish_subject(&self) -> Option<String> {
        None
    }
    /// Build the channel's processed-message payload for final delivery.
    fn to_processed(&self, template: Option<&EmailTemplate>) -> Result<JsonValue, Error>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(rename = "from", default = "default_sender")]
    pub sender: String,
    #[serde(default)]
    pub recipients: Vec<ResolvedRecipient>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsMessage {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "senderId", default = "default_sender_id")]
    pub sender_id: String,
    #[serde(default)]
    pub recipients: Vec<ResolvedRecipient>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMessage {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default)]
    pub data: HashMap<String, JsonValue>,
    #[serde(default)]
    pub recipients: Vec<ResolvedRecipient>,
}

pub fn default_subject() -> String {
    "No subject".to_string()
}

pub fn default_sender() -> String {
    "no-reply@example.com".to_string()
}

pub fn default_sender_id() -> String {
    "Notify".to_string()
}

fn default_title() -> String {
    "Notification".to_string()
}

fn default_priority() -> String {
    "normal".to_string()
}

impl ChannelPayload for EmailMessage {
    fn audit_type() -> &'static str {
        "email-notification"
    }

    fn route() -> &'static str {
        "/users/emails"
    }

    fn processed_key() -> &'static str {
        "email_processed_message"
    }

    fn needs_template() -> bool {
        true
    }

    fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    fn recipients(&self) -> &[ResolvedRecipient] {
        &self.recipients
    }

    fn publish_subject(&self) -> Option<String> {
        Some(self.subject.clone())
    }

    fn to_processed(&self, template: Option<&EmailTemplate>) -> Result<JsonValue, Error> {
        let template =
            template.ok_or_else(|| anyhow!("Email processing requires a loaded template"))?;

        Ok(serde_json::json!({
            "subject": self.subject,
            "body": template.render(&self.body),
            "from": self.sender,
            "recipients": self.recipients,
        }))
    }
}

impl ChannelPayload for SmsMessage {
    fn audit_type() -> &'static str {
        "sms-notification"
    }

    fn route() -> &'static str {
        "/users/sms"
    }

    fn processed_key() -> &'static str {
        "sms_processed_message"
    }

    fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    fn recipients(&self) -> &[ResolvedRecipient] {
        &self.recipients
    }

    fn to_processed(&self, _template: Option<&EmailTemplate>) -> Result<JsonValue, Error> {
        Ok(serde_json::json!({
            "message": self.message,
            "senderId": self.sender_id,
            "recipients": self.recipients,
        }))
    }
}

impl ChannelPayload for PushMessage {
    fn audit_type() -> &'static str {
        "push-notification"
    }

    fn route() -> &'static str {
        "/users/push"
    }

    fn processed_key() -> &'static str {
        "push_processed_message"
    }

    fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    fn recipients(&self) -> &[ResolvedRecipient] {
        &self.recipients
    }

    fn publish_subject(&self) -> Option<String> {
        Some("Push notification processed".to_string())
    }

    fn to_processed(&self, _template: Option<&EmailTemplate>) -> Result<JsonValue, Error> {
        Ok(serde_json::json!({
            "title": self.title,
            "body": self.body,
            "priority": self.priority,
            "data": self.data,
            "recipients": self.recipients,
        }))
    }
}
