use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use tracing::info;

use crate::models::policy::TokenClaims;

/// Bearer-token verification. Implementations must check the signature and
/// the issuer; an unverified decode is never acceptable here.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<TokenClaims, Error>;
}

pub struct JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(public_key_path: &str, issuer: &str) -> Result<Self, Error> {
        let public_key_pem = std::fs::read_to_string(public_key_path).map_err(|e| {
            anyhow!("Failed to read public key from {}: {}", public_key_path, e)
        })?;

        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| anyhow!("Failed to parse public key: {}", e))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[issuer]);

        info!(issuer, "Token validator initialized with RS256 key");

        Ok(Self {
            decoding_key,
            validation,
        })
    }
}

#[async_trait]
impl TokenValidator for JwtValidator {
    async fn validate(&self, token: &str) -> Result<TokenClaims, Error> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| anyhow!("Token validation failed: {}", e))?;

        Ok(data.claims)
    }
}
