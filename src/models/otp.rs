use std::fmt::{Display, Formatter, Result};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A one-time code bound to a user and a transaction type. At most one
/// record may be active per (user_id, transaction_type) at verification
/// time; the filter on `Pending` status enforces that at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRecord {
    pub id: i64,
    pub otp: String,
    pub user_id: String,
    pub transaction_type: String,
    pub status: OtpStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OtpStatus {
    Pending,
    Used,
}

impl OtpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpStatus::Pending => "PENDING",
            OtpStatus::Used => "USED",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "USED" => OtpStatus::Used,
            _ => OtpStatus::Pending,
        }
    }
}

impl Display for OtpStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.as_str())
    }
}
