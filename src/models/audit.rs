use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One pipeline stage's input/output for a transaction. Append-only once
/// ingested; several stages of one transaction each emit their own event
/// sharing the transaction id, forming a causal trail rather than a single
/// row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    #[serde(default = "unknown_field")]
    pub transaction_id: String,
    #[serde(rename = "type", default = "unknown_type")]
    pub event_type: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default = "unknown_field")]
    pub path: String,
    #[serde(default)]
    pub request_body: JsonValue,
    #[serde(default)]
    pub transaction_output: JsonValue,
    #[serde(default = "unknown_field")]
    pub request_id: String,
}

impl AuditEvent {
    pub fn new(
        transaction_id: impl Into<String>,
        event_type: impl Into<String>,
        path: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            event_type: event_type.into(),
            timestamp: audit_timestamp(Utc::now()),
            path: path.into(),
            request_body: JsonValue::Null,
            transaction_output: JsonValue::Null,
            request_id: request_id.into(),
        }
    }

    pub fn with_request_body(mut self, body: JsonValue) -> Self {
        self.request_body = body;
        self
    }

    pub fn with_output(mut self, output: JsonValue) -> Self {
        self.transaction_output = output;
        self
    }
}

/// Microsecond-precision timestamp whose lexicographic order matches
/// chronological order, e.g. `2026-08-07-14.03.22.000415`.
pub fn audit_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d-%H.%M.%S.%6f").to_string()
}

fn unknown_field() -> String {
    "N/A".to_string()
}

fn unknown_type() -> String {
    "unknown".to_string()
}
