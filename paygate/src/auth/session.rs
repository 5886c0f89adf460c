//! Tenant JWT verification.
//!
//! Tenant tokens are HS256 JWTs signed with a shared key from the secret store. Issuer and
//! audience are not checked; expiry and not-before are, with a configurable leeway.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::TenantId;

/// Claims carried by a tenant token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl TenantClaims {
    /// Claims for a tenant valid from now for `ttl`
    pub fn new(tenant_id: TenantId, merchant_account: &str, subject: Option<&str>, ttl: Duration) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: subject.map(str::to_string),
            tenant_id: Some(tenant_id.to_string()),
            merchant_account: Some(merchant_account.to_string()),
            jti: Some(Uuid::new_v4().to_string()),
            exp: now + ttl.as_secs() as i64,
            nbf: Some(now),
            iat: Some(now),
        }
    }

    /// The `tenantId` claim as a UUID, if present and well formed.
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    /// The `merchantAccount` claim, if present and non-blank.
    pub fn merchant_account(&self) -> Option<&str> {
        self.merchant_account.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Principal reported to API Gateway for this token
    pub fn principal(&self) -> String {
        self.sub
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("tenant")
            .to_string()
    }
}

/// Reasons a token is not accepted
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The token itself is bad: malformed, wrongly signed, expired or not yet valid
    #[error("token rejected: {0}")]
    Rejected(jsonwebtoken::errors::Error),

    /// The key or the library failed
    #[error("token verification failed: {0}")]
    Internal(jsonwebtoken::errors::Error),
}

fn validation(leeway: Duration) -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = leeway.as_secs();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp"]);
    validation
}

/// Create a tenant token. Used by tooling and tests; tokens are normally minted by the
/// payment API.
pub fn create_tenant_token(claims: &TenantClaims, secret: &str) -> Result<String, TokenError> {
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &key).map_err(TokenError::Internal)
}

/// Verify and decode a tenant token
pub fn verify_tenant_token(token: &str, secret: &str, leeway: Duration) -> Result<TenantClaims, TokenError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let token_data = decode::<TenantClaims>(token, &key, &validation(leeway)).map_err(|e| match e.kind() {
        ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::ExpiredSignature
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject
        | ErrorKind::ImmatureSignature
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::InvalidAlgorithm => TokenError::Rejected(e),

        // Key issues and anything new are treated as server-side failures
        _ => TokenError::Internal(e),
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-signing-secret";
    const LEEWAY: Duration = Duration::from_secs(60);

    fn claims() -> TenantClaims {
        TenantClaims::new(Uuid::new_v4(), "TestMerchant", Some("user-1"), Duration::from_secs(3600))
    }

    #[test]
    fn test_create_and_verify_tenant_token() {
        let claims = claims();
        let token = create_tenant_token(&claims, SECRET).unwrap();

        let verified = verify_tenant_token(&token, SECRET, LEEWAY).unwrap();
        assert_eq!(verified.tenant_id(), claims.tenant_id());
        assert_eq!(verified.merchant_account(), Some("TestMerchant"));
        assert_eq!(verified.principal(), "user-1");
        assert_eq!(verified.jti, claims.jti);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = create_tenant_token(&claims(), SECRET).unwrap();
        let err = verify_tenant_token(&token, "another-secret", LEEWAY).unwrap_err();
        assert!(matches!(err, TokenError::Rejected(_)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let mut claims = claims();
        claims.exp = Utc::now().timestamp() - 3600;
        claims.nbf = Some(claims.exp - 60);
        let token = create_tenant_token(&claims, SECRET).unwrap();

        let err = verify_tenant_token(&token, SECRET, LEEWAY).unwrap_err();
        match err {
            TokenError::Rejected(e) => assert!(matches!(e.kind(), ErrorKind::ExpiredSignature)),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_leeway_tolerates_recent_expiry() {
        let mut claims = claims();
        claims.exp = Utc::now().timestamp() - 10;
        claims.nbf = None;
        let token = create_tenant_token(&claims, SECRET).unwrap();

        assert!(verify_tenant_token(&token, SECRET, LEEWAY).is_ok());
        assert!(verify_tenant_token(&token, SECRET, Duration::ZERO).is_err());
    }

    #[test]
    fn test_not_yet_valid_token_is_rejected() {
        let mut claims = claims();
        claims.nbf = Some(Utc::now().timestamp() + 3600);
        let token = create_tenant_token(&claims, SECRET).unwrap();

        let err = verify_tenant_token(&token, SECRET, LEEWAY).unwrap_err();
        match err {
            TokenError::Rejected(e) => assert!(matches!(e.kind(), ErrorKind::ImmatureSignature)),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_audience_and_issuer_are_ignored() {
        #[derive(Serialize)]
        struct Foreign {
            #[serde(rename = "tenantId")]
            tenant_id: String,
            exp: i64,
            aud: String,
            iss: String,
        }
        let key = EncodingKey::from_secret(SECRET.as_bytes());
        let token = encode(
            &Header::new(Algorithm::HS256),
            &Foreign {
                tenant_id: Uuid::new_v4().to_string(),
                exp: Utc::now().timestamp() + 600,
                aud: "someone-else".to_string(),
                iss: "elsewhere".to_string(),
            },
            &key,
        )
        .unwrap();

        let verified = verify_tenant_token(&token, SECRET, LEEWAY).unwrap();
        assert!(verified.tenant_id().is_some());
        assert_eq!(verified.principal(), "tenant");
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(
            verify_tenant_token("not.a.jwt", SECRET, LEEWAY),
            Err(TokenError::Rejected(_))
        ));
    }

    #[test]
    fn test_claim_accessors() {
        let claims = TenantClaims {
            tenant_id: Some("  ".to_string()),
            merchant_account: Some(" ".to_string()),
            sub: Some("".to_string()),
            ..Default::default()
        };
        assert_eq!(claims.tenant_id(), None);
        assert_eq!(claims.merchant_account(), None);
        assert_eq!(claims.principal(), "tenant");

        let claims = TenantClaims {
            tenant_id: Some("not-a-uuid".to_string()),
            ..Default::default()
        };
        assert_eq!(claims.tenant_id(), None);
    }
}
