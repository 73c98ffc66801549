use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    clients::{policy::PolicyDecisionPoint, token::TokenValidator},
    models::{
        audit::AuditEvent,
        policy::{AuthorizeRequest, AuthorizerResponse, Decision, TokenClaims},
    },
    pipeline::audit::AuditRecorder,
};

const AUDIT_TYPE: &str = "auth-request";
const AUDIT_PATH: &str = "/auth/authorize";

/// Gates access to the pipeline. Validates the bearer token, applies the
/// root-privilege shortcut, and otherwise defers to the policy decision
/// point. Always answers with an explicit Allow or Deny policy bound to the
/// caller's method ARN, and audits every decision with the token masked.
#[derive(Clone)]
pub struct RequestAuthorizer {
    validator: Arc<dyn TokenValidator>,
    policy: Arc<dyn PolicyDecisionPoint>,
    audit: AuditRecorder,
}

impl RequestAuthorizer {
    pub fn new(
        validator: Arc<dyn TokenValidator>,
        policy: Arc<dyn PolicyDecisionPoint>,
        audit: AuditRecorder,
    ) -> Self {
        Self {
            validator,
            policy,
            audit,
        }
    }

    pub async fn authorize(
        &self,
        request: AuthorizeRequest,
        request_id: &str,
    ) -> AuthorizerResponse {
        let transaction_id = Uuid::new_v4().to_string();

        let Some(token) = extract_token(&request) else {
            warn!("No authorization token provided");
            return self
                .deny(
                    &transaction_id,
                    &request.method_arn,
                    "No authorization token provided",
                    request_id,
                )
                .await;
        };

        let claims = match self.validator.validate(&token).await {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Token validation failed");
                return self
                    .deny(
                        &transaction_id,
                        &request.method_arn,
                        &e.to_string(),
                        request_id,
                    )
                    .await;
            }
        };

        let decision = self.decide(&request, &claims).await;

        let response = AuthorizerResponse::new(&claims.sub, decision, &request.method_arn)
            .with_context(serde_json::json!({
                "user_id": &claims.sub,
                "email": &claims.email,
                "org_id": &claims.org_id,
            }));

        self.audit
            .record(
                AuditEvent::new(transaction_id.as_str(), AUDIT_TYPE, AUDIT_PATH, request_id)
                    .with_request_body(serde_json::json!({ "token": "***" }))
                    .with_output(serde_json::json!({
                        "status": decision.as_str().to_uppercase(),
                        "principal": &claims.sub,
                    })),
            )
            .await;

        info!(
            principal = %claims.sub,
            decision = decision.as_str(),
            "Authorization decided"
        );

        response
    }

    async fn decide(&self, request: &AuthorizeRequest, claims: &TokenClaims) -> Decision {
        if validate_root(claims) {
            info!(principal = %claims.sub, "Root shortcut applied");
            return Decision::Allow;
        }

        if request.resources.is_empty() {
            return Decision::Deny;
        }

        let result = if request.resources.len() == 1 {
            self.policy
                .is_authorized(&claims.sub, &request.action, &request.resources[0])
                .await
        } else {
            self.policy
                .batch_is_authorized(&claims.sub, &request.action, &request.resources)
                .await
                .map(|decisions| {
                    decisions
                        .into_iter()
                        .find(|decision| *decision == Decision::Allow)
                        .unwrap_or(Decision::Deny)
                })
        };

        match result {
            Ok(decision) => decision,
            Err(e) => {
                warn!(error = %e, "Policy decision call failed, denying");
                Decision::Deny
            }
        }
    }

    async fn deny(
        &self,
        transaction_id: &str,
        method_arn: &str,
        error: &str,
        request_id: &str,
    ) -> AuthorizerResponse {
        self.audit
            .record(
                AuditEvent::new(transaction_id, AUDIT_TYPE, AUDIT_PATH, request_id)
                    .with_request_body(serde_json::json!({ "token": "***" }))
                    .with_output(serde_json::json!({
                        "status": "DENY",
                        "error": error,
                    })),
            )
            .await;

        AuthorizerResponse::new("unauthorized", Decision::Deny, method_arn)
    }
}

/// Bearer token from the Authorization header, falling back to the legacy
/// `authorization_token` field.
fn extract_token(request: &AuthorizeRequest) -> Option<String> {
    let header = request
        .headers
        .get("authorization")
        .or_else(|| request.headers.get("Authorization"))
        .cloned()
        .or_else(|| request.authorization_token.clone())?;

    let token = header.strip_prefix("Bearer ").unwrap_or(&header);

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Root privilege is claimed by carrying the SHA-256 hex digest of the
/// subject id in the `root` claim.
fn validate_root(claims: &TokenClaims) -> bool {
    let Some(root) = &claims.root else {
        return false;
    };

    let digest = hex::encode(Sha256::digest(claims.sub.as_bytes()));

    digest == *root
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn claims(sub: &str, root: Option<String>) -> TokenClaims {
        TokenClaims {
            sub: sub.to_string(),
            email: None,
            org_id: None,
            root,
            exp: 4_102_444_800,
            iat: None,
        }
    }

    #[test]
    fn test_validate_root_accepts_matching_digest() {
        let digest = hex::encode(Sha256::digest(b"user-1"));

        assert!(validate_root(&claims("user-1", Some(digest))));
    }

    #[test]
    fn test_validate_root_rejects_wrong_digest() {
        assert!(!validate_root(&claims(
            "user-1",
            Some("deadbeef".to_string())
        )));
        assert!(!validate_root(&claims("user-1", None)));
    }

    #[test]
    fn test_extract_token_prefers_header() {
        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), "Bearer abc".to_string());

        let request = AuthorizeRequest {
            headers,
            authorization_token: Some("Bearer legacy".to_string()),
            method_arn: "arn:test".to_string(),
            action: "invoke".to_string(),
            resources: Vec::new(),
        };

        assert_eq!(extract_token(&request).as_deref(), Some("abc"));
    }

    #[test]
    fn test_extract_token_falls_back_to_legacy_field() {
        let request = AuthorizeRequest {
            headers: HashMap::new(),
            authorization_token: Some("Bearer legacy".to_string()),
            method_arn: "arn:test".to_string(),
            action: "invoke".to_string(),
            resources: Vec::new(),
        };

        assert_eq!(extract_token(&request).as_deref(), Some("legacy"));
    }

    #[test]
    fn test_extract_token_absent() {
        let request = AuthorizeRequest {
            headers: HashMap::new(),
            authorization_token: None,
            method_arn: "arn:test".to_string(),
            action: "invoke".to_string(),
            resources: Vec::new(),
        };

        assert_eq!(extract_token(&request), None);
    }
}
