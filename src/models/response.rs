use serde::{Deserialize, Serialize};

use crate::models::message::ResolvedRecipient;

/// 200 body for a handled dispatch: confirmation text plus the recipients
/// that actually resolved (possibly empty).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub message: String,
    pub recipients: Vec<ResolvedRecipient>,
}

/// 4xx/5xx body for the notification routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Stable code/message pair for the OTP verification route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodedError {
    pub code: String,
    pub message: String,
}

impl CodedError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn missing_headers() -> Self {
        Self::new(
            "MISSING_HEADERS",
            "x-user-id and x-user-name headers are required",
        )
    }

    pub fn missing_fields() -> Self {
        Self::new("MISSING_FIELDS", "otp and transaction_type are required")
    }

    pub fn otp_not_found() -> Self {
        Self::new("OTP_NOT_FOUND", "The OTP is invalid or has expired")
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "An internal server error occurred")
    }
}
