use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Claims extracted from a verified bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    /// Root-privilege marker: the SHA-256 hex digest of `sub` for accounts
    /// allowed to bypass the policy-decision call.
    #[serde(default)]
    pub root: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "Allow",
            Decision::Deny => "Deny",
        }
    }
}

/// A resource submitted to the policy decision point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRef {
    pub entity_id: String,
    pub entity_type: String,
}

/// Inbound authorization request: token in headers or the legacy field,
/// plus the method ARN the resulting policy binds to.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeRequest {
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub authorization_token: Option<String>,
    pub method_arn: String,
    #[serde(default = "default_action")]
    pub action: String,
    #[serde(default)]
    pub resources: Vec<ResourceRef>,
}

fn default_action() -> String {
    "invoke".to_string()
}

/// Gateway-style policy response. Field casing follows the policy document
/// format the gateway consumes, not this crate's conventions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizerResponse {
    #[serde(rename = "principalId")]
    pub principal_id: String,
    #[serde(rename = "policyDocument")]
    pub policy_document: PolicyDocument,
    #[serde(default)]
    pub context: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statement: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyStatement {
    #[serde(rename = "Action")]
    pub action: String,
    #[serde(rename = "Effect")]
    pub effect: Decision,
    #[serde(rename = "Resource")]
    pub resource: String,
}

impl AuthorizerResponse {
    pub fn new(principal_id: impl Into<String>, decision: Decision, resource_arn: &str) -> Self {
        Self {
            principal_id: principal_id.into(),
            policy_document: PolicyDocument {
                version: "2012-10-17".to_string(),
                statement: vec![PolicyStatement {
                    action: "execute-api:Invoke".to_string(),
                    effect: decision,
                    resource: resource_arn.to_string(),
                }],
            },
            context: JsonValue::Null,
        }
    }

    pub fn with_context(mut self, context: JsonValue) -> Self {
        self.context = context;
        self
    }

    pub fn decision(&self) -> Decision {
        self.policy_document
            .statement
            .first()
            .map(|statement| statement.effect)
            .unwrap_or(Decision::Deny)
    }
}
