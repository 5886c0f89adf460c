//! API Gateway REQUEST authorizer input and IAM policy output.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The REQUEST authorizer event, reduced to the fields the decision needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerRequest {
    #[serde(default)]
    pub method_arn: Option<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
    #[serde(default)]
    pub request_context: Option<RequestContext>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub identity: Option<RequestIdentity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestIdentity {
    #[serde(default)]
    pub source_ip: Option<String>,
}

fn lookup_ignore_case<'a>(map: Option<&'a HashMap<String, String>>, name: &str) -> Option<&'a str> {
    map?.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

impl AuthorizerRequest {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup_ignore_case(self.headers.as_ref(), name)
    }

    /// Case-insensitive query parameter lookup
    pub fn query_param(&self, name: &str) -> Option<&str> {
        lookup_ignore_case(self.query_string_parameters.as_ref(), name)
    }

    /// The caller's address: the gateway-observed source IP, else the first
    /// `X-Forwarded-For` entry, else empty.
    pub fn source_ip(&self) -> String {
        let observed = self
            .request_context
            .as_ref()
            .and_then(|ctx| ctx.identity.as_ref())
            .and_then(|identity| identity.source_ip.as_deref())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        if let Some(ip) = observed {
            return ip.to_string();
        }

        self.header("x-forwarded-for")
            .and_then(|xff| xff.split(',').next())
            .map(|ip| ip.trim().to_string())
            .unwrap_or_default()
    }

    /// The merchant account named by the `x-merchant-account` header or the
    /// `merchantAccount` query parameter, trimmed and non-blank.
    pub fn merchant_account(&self) -> Option<String> {
        [self.header("x-merchant-account"), self.query_param("merchantAccount")]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }
}

/// The route addressed by a method ARN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodArn {
    pub method: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed method ARN: {0}")]
pub struct ArnError(pub String);

impl MethodArn {
    /// Parse `arn:aws:execute-api:{region}:{account}:{apiId}/{stage}/{method}/{path...}`.
    ///
    /// A resource with no path segments addresses `/`.
    pub fn parse(arn: &str) -> Result<Self, ArnError> {
        let resource = arn.splitn(6, ':').nth(5).ok_or_else(|| ArnError(arn.to_string()))?;

        let segments: Vec<&str> = resource.split('/').collect();
        if segments.len() < 3 || segments[2].is_empty() {
            return Err(ArnError(arn.to_string()));
        }

        let path = if segments.len() >= 4 {
            format!("/{}", segments[3..].join("/"))
        } else {
            "/".to_string()
        };

        Ok(Self {
            method: segments[2].to_string(),
            path,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    #[serde(rename = "Action")]
    pub action: Vec<String>,
    #[serde(rename = "Effect")]
    pub effect: Effect,
    #[serde(rename = "Resource")]
    pub resource: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statement: Vec<PolicyStatement>,
}

/// The authorizer's answer to API Gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyResponse {
    pub principal_id: String,
    pub policy_document: PolicyDocument,
}

impl PolicyResponse {
    pub fn new(principal_id: impl Into<String>, effect: Effect, resource: impl Into<String>) -> Self {
        Self {
            principal_id: principal_id.into(),
            policy_document: PolicyDocument {
                version: "2012-10-17".to_string(),
                statement: vec![PolicyStatement {
                    action: vec!["execute-api:Invoke".to_string()],
                    effect,
                    resource: vec![resource.into()],
                }],
            },
        }
    }

    pub fn effect(&self) -> Option<Effect> {
        self.policy_document.statement.first().map(|s| s.effect)
    }
}
