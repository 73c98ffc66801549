use std::sync::Arc;

use anyhow::{Error, Result};
use tracing::{info, warn};

use crate::clients::otp_store::OtpStore;

/// Outcome of a verification attempt. `NotFound` covers both a wrong code
/// and an already-consumed one; callers cannot distinguish the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    NotFound,
}

#[derive(Clone)]
pub struct OtpService {
    store: Arc<dyn OtpStore>,
}

impl OtpService {
    pub fn new(store: Arc<dyn OtpStore>) -> Self {
        Self { store }
    }

    /// Uniformly random 6-digit decimal code.
    pub fn generate(&self) -> String {
        rand::random_range(100_000..=999_999).to_string()
    }

    /// Persist a pending code. Issuance is fire-and-forget: a store failure
    /// is logged and swallowed, surfacing to the user only as a code that
    /// never arrives.
    pub async fn store(&self, user_id: &str, otp: &str, transaction_type: &str) {
        match self.store.insert(user_id, otp, transaction_type).await {
            Ok(()) => {
                info!(user_id, transaction_type, "OTP issued");
            }
            Err(e) => {
                warn!(user_id, transaction_type, error = %e, "Failed to store OTP");
            }
        }
    }

    /// Consume a matching active code. The status flip is scoped to the
    /// matched row, so a second verification of the same triple misses.
    pub async fn verify(
        &self,
        user_id: &str,
        otp: &str,
        transaction_type: &str,
    ) -> Result<VerifyOutcome, Error> {
        let record = self
            .store
            .find_active(user_id, otp, transaction_type)
            .await?;

        match record {
            Some(record) => {
                self.store.mark_used(record.id).await?;
                info!(user_id, transaction_type, "OTP verified and consumed");
                Ok(VerifyOutcome::Verified)
            }
            None => {
                warn!(user_id, transaction_type, "No matching active OTP");
                Ok(VerifyOutcome::NotFound)
            }
        }
    }
}
