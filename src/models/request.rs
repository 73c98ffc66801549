use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Inbound notification requests, one shape per channel. Optional payload
/// fields fall back to the same fixed defaults the routed messages use.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub to: Vec<String>,
    pub subject: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(rename = "from")]
    pub sender: Option<String>,
    pub transaction_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmsRequest {
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "senderId")]
    pub sender_id: Option<String>,
    pub transaction_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushRequest {
    #[serde(default)]
    pub to: Vec<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub body: String,
    pub priority: Option<String>,
    #[serde(default)]
    pub data: HashMap<String, JsonValue>,
    pub transaction_type: Option<String>,
}

/// Body of `POST /otp/verify`. Fields are optional so absence maps to a
/// structured `MISSING_FIELDS` response instead of a deserialization error.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyOtpRequest {
    pub otp: Option<String>,
    pub transaction_type: Option<String>,
}
