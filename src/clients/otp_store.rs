use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    clients::database::DatabaseClient,
    models::otp::{OtpRecord, OtpStatus},
};

/// Persistence for one-time codes. `find_active` only matches records still
/// in `PENDING` status; the single-row `mark_used` transition is what makes
/// a code single-use.
#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn insert(&self, user_id: &str, otp: &str, transaction_type: &str)
    -> Result<(), Error>;

    async fn find_active(
        &self,
        user_id: &str,
        otp: &str,
        transaction_type: &str,
    ) -> Result<Option<OtpRecord>, Error>;

    async fn mark_used(&self, id: i64) -> Result<(), Error>;
}

pub struct PostgresOtpStore {
    db: DatabaseClient,
}

impl PostgresOtpStore {
    pub fn new(db: DatabaseClient) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OtpStore for PostgresOtpStore {
    async fn insert(
        &self,
        user_id: &str,
        otp: &str,
        transaction_type: &str,
    ) -> Result<(), Error> {
        self.db
            .client()
            .execute(
                "INSERT INTO otps (otp, user_id, transaction_type, status, created_at) \
                 VALUES ($1, $2, $3, $4, NOW())",
                &[&otp, &user_id, &transaction_type, &OtpStatus::Pending.as_str()],
            )
            .await
            .map_err(|e| anyhow!("Failed to store OTP for {}: {}", user_id, e))?;

        debug!(user_id, transaction_type, "OTP stored");

        Ok(())
    }

    async fn find_active(
        &self,
        user_id: &str,
        otp: &str,
        transaction_type: &str,
    ) -> Result<Option<OtpRecord>, Error> {
        let row = self
            .db
            .client()
            .query_opt(
                "SELECT id, otp, user_id, transaction_type, status, created_at FROM otps \
                 WHERE user_id = $1 AND otp = $2 AND transaction_type = $3 AND status = $4",
                &[&user_id, &otp, &transaction_type, &OtpStatus::Pending.as_str()],
            )
            .await
            .map_err(|e| anyhow!("OTP lookup failed for {}: {}", user_id, e))?;

        let record = match row {
            Some(row) => {
                let status: String = row
                    .try_get("status")
                    .map_err(|e| anyhow!("OTP row decode failed: {}", e))?;
                let created_at: DateTime<Utc> = row
                    .try_get("created_at")
                    .map_err(|e| anyhow!("OTP row decode failed: {}", e))?;

                Some(OtpRecord {
                    id: row
                        .try_get("id")
                        .map_err(|e| anyhow!("OTP row decode failed: {}", e))?,
                    otp: row
                        .try_get("otp")
                        .map_err(|e| anyhow!("OTP row decode failed: {}", e))?,
                    user_id: row
                        .try_get("user_id")
                        .map_err(|e| anyhow!("OTP row decode failed: {}", e))?,
                    transaction_type: row
                        .try_get("transaction_type")
                        .map_err(|e| anyhow!("OTP row decode failed: {}", e))?,
                    status: OtpStatus::from_str(&status),
                    created_at,
                })
            }
            None => None,
        };

        Ok(record)
    }

    async fn mark_used(&self, id: i64) -> Result<(), Error> {
        self.db
            .client()
            .execute(
                "UPDATE otps SET status = $1 WHERE id = $2",
                &[&OtpStatus::Used.as_str(), &id],
            )
            .await
            .map_err(|e| anyhow!("Failed to mark OTP {} as used: {}", id, e))?;

        Ok(())
    }
}
