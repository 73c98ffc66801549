use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};

/// Delivery medium for a notification. Each channel has its own payload
/// shape and its own address type in the user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    Push,
}

impl Channel {
    /// Column holding this channel's delivery address in the user directory.
    pub fn address_field(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "phone",
            Channel::Push => "device_token",
        }
    }

    pub fn route(&self) -> &'static str {
        match self {
            Channel::Email => "/users/emails",
            Channel::Sms => "/users/sms",
            Channel::Push => "/users/push",
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Channel::Email => write!(f, "email"),
            Channel::Sms => write!(f, "sms"),
            Channel::Push => write!(f, "push"),
        }
    }
}
