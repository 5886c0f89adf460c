//! The API Gateway authorizer decision.
//!
//! Routes fall into three classes, checked in order:
//!
//! 1. **Public**: preflights, webhooks, token exchange, `/` and `/health` are always allowed.
//! 2. **`/paymentmethods`**: called from merchant storefronts with an `x-api-key` and a merchant
//!    account. The key must belong to that merchant and the caller's IP must be on the
//!    merchant's allowlist.
//! 3. **Everything else**: requires a tenant bearer token. The token's tenant must exist, the
//!    caller's IP must be on that tenant's allowlist and the token's merchant account must
//!    match the stored one.
//!
//! [`Authorizer::evaluate`] returns the reason for every denial as an [`AuthorizeError`];
//! [`Authorizer::authorize`] turns that into the Deny policy API Gateway expects.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::auth::allowlist::is_ip_allowed;
use crate::auth::policy::{ArnError, AuthorizerRequest, Effect, MethodArn, PolicyResponse};
use crate::auth::session::{TokenError, verify_tenant_token};
use crate::config::AuthorizerConfig;
use crate::db::errors::DbError;
use crate::db::handlers::TenantStore;
use crate::db::models::tenants::Tenant;
use crate::secrets::{SecretError, SecretStore, TenantSecret, jwt_secret_from_value, load_tenant_secret};
use crate::types::{TenantId, abbrev_uuid};

/// Principal reported for requests that are not tied to a tenant
pub const ANONYMOUS_PRINCIPAL: &str = "anonymous";

/// Why a request was allowed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Public route
    Bypass,
    /// Storefront call authenticated with a tenant API key
    ApiKey { merchant_account: String },
    /// Call authenticated with a tenant bearer token
    Token { principal: String, tenant_id: TenantId },
}

impl Decision {
    pub fn principal(&self) -> &str {
        match self {
            Decision::Bypass => ANONYMOUS_PRINCIPAL,
            Decision::ApiKey { merchant_account } => merchant_account,
            Decision::Token { principal, .. } => principal,
        }
    }
}

/// Why a request was denied
#[derive(Debug, thiserror::Error)]
pub enum AuthorizeError {
    #[error("method ARN missing")]
    MissingMethodArn,

    #[error(transparent)]
    MalformedArn(#[from] ArnError),

    #[error("missing x-api-key")]
    MissingApiKey,

    #[error("missing merchantAccount (x-merchant-account header or merchantAccount query)")]
    MissingMerchantAccount,

    #[error("tenant not found by merchantAccount '{0}'")]
    UnknownMerchant(String),

    #[error("x-api-key not in tenant secret")]
    ApiKeyMismatch,

    #[error("ip not allowed ({0:?})")]
    IpNotAllowed(String),

    #[error("missing or invalid bearer token header")]
    MissingBearerToken,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("missing claims tenantId/merchantAccount")]
    MissingClaims,

    #[error("tenantId {0} not found")]
    UnknownTenant(TenantId),

    #[error("merchant claim does not match tenant")]
    MerchantMismatch,

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Database(#[from] DbError),
}

/// Paths reachable without credentials.
fn is_public(method: &str, path: &str) -> bool {
    let path_lower = path.to_ascii_lowercase();

    method.eq_ignore_ascii_case("OPTIONS")
        || path_lower.contains("/webhook")
        || (method.eq_ignore_ascii_case("POST") && path_lower.ends_with("/token/exchange"))
        || path_lower == "/"
        || path_lower == "/health"
}

/// Extract the token from `Authorization: Bearer <token>` (scheme case-insensitive).
fn bearer_token(request: &AuthorizerRequest) -> Option<&str> {
    let header = request.header("authorization")?;
    let scheme = header.get(..7)?;
    if !scheme.eq_ignore_ascii_case("bearer ") {
        return None;
    }
    let token = header[7..].trim();
    (!token.is_empty()).then_some(token)
}

/// Evaluates authorizer requests against tenant configuration.
#[derive(Clone)]
pub struct Authorizer {
    tenants: Arc<dyn TenantStore>,
    secrets: Arc<dyn SecretStore>,
    config: AuthorizerConfig,
}

impl Authorizer {
    pub fn new(tenants: Arc<dyn TenantStore>, secrets: Arc<dyn SecretStore>, config: AuthorizerConfig) -> Self {
        Self { tenants, secrets, config }
    }

    /// Produce the policy for a request. Every failure becomes a Deny on the requested
    /// resource.
    #[instrument(skip_all)]
    pub async fn authorize(&self, request: &AuthorizerRequest) -> PolicyResponse {
        let resource = request.method_arn.as_deref().filter(|arn| !arn.is_empty()).unwrap_or("*");

        match self.evaluate(request).await {
            Ok(decision) => {
                info!(principal = decision.principal(), decision = ?decision, "authorizer: allow");
                PolicyResponse::new(decision.principal(), Effect::Allow, resource)
            }
            Err(reason) => {
                warn!(reason = %reason, source_ip = %request.source_ip(), "authorizer: deny");
                PolicyResponse::new(ANONYMOUS_PRINCIPAL, Effect::Deny, resource)
            }
        }
    }

    /// Decide whether a request is allowed.
    pub async fn evaluate(&self, request: &AuthorizerRequest) -> Result<Decision, AuthorizeError> {
        let arn = request.method_arn.as_deref().ok_or(AuthorizeError::MissingMethodArn)?;
        let route = MethodArn::parse(arn)?;
        let source_ip = request.source_ip();

        tracing::debug!(method = %route.method, path = %route.path, source_ip = %source_ip, "authorizer: evaluating");

        if is_public(&route.method, &route.path) {
            return Ok(Decision::Bypass);
        }

        if route.path.to_ascii_lowercase().ends_with("/paymentmethods") {
            return self.authorize_api_key(request, &source_ip).await;
        }

        self.authorize_token(request, &source_ip).await
    }

    async fn tenant_secret(&self, tenant: &Tenant) -> Result<TenantSecret, AuthorizeError> {
        Ok(load_tenant_secret(self.secrets.as_ref(), &tenant.resolved_secret_name()).await?)
    }

    async fn authorize_api_key(&self, request: &AuthorizerRequest, source_ip: &str) -> Result<Decision, AuthorizeError> {
        let api_key = request
            .header("x-api-key")
            .filter(|key| !key.trim().is_empty())
            .ok_or(AuthorizeError::MissingApiKey)?;

        let merchant_account = request.merchant_account().ok_or(AuthorizeError::MissingMerchantAccount)?;

        let tenant = self
            .tenants
            .by_merchant_account(&merchant_account)
            .await?
            .ok_or_else(|| AuthorizeError::UnknownMerchant(merchant_account.clone()))?;

        let secret = self.tenant_secret(&tenant).await?;

        if !secret.accepts_api_key(api_key) {
            return Err(AuthorizeError::ApiKeyMismatch);
        }
        if !is_ip_allowed(source_ip, &secret.ip_allowlist) {
            return Err(AuthorizeError::IpNotAllowed(source_ip.to_string()));
        }

        Ok(Decision::ApiKey {
            merchant_account: tenant.merchant_account,
        })
    }

    async fn jwt_secret(&self) -> Result<String, AuthorizeError> {
        let value = self.secrets.get_secret(&self.config.jwt_secret_name).await?;
        Ok(jwt_secret_from_value(&value))
    }

    async fn authorize_token(&self, request: &AuthorizerRequest, source_ip: &str) -> Result<Decision, AuthorizeError> {
        let token = bearer_token(request).ok_or(AuthorizeError::MissingBearerToken)?;

        let jwt_secret = self.jwt_secret().await?;
        let claims = verify_tenant_token(token, &jwt_secret, self.config.token_leeway)?;

        let (Some(tenant_id), Some(claimed_merchant)) = (claims.tenant_id(), claims.merchant_account()) else {
            return Err(AuthorizeError::MissingClaims);
        };

        let tenant = self
            .tenants
            .by_id(tenant_id)
            .await?
            .ok_or(AuthorizeError::UnknownTenant(tenant_id))?;

        let secret = self.tenant_secret(&tenant).await?;
        if !is_ip_allowed(source_ip, &secret.ip_allowlist) {
            return Err(AuthorizeError::IpNotAllowed(source_ip.to_string()));
        }

        if !claimed_merchant.eq_ignore_ascii_case(tenant.merchant_account.trim()) {
            return Err(AuthorizeError::MerchantMismatch);
        }

        tracing::debug!(tenant_id = %abbrev_uuid(&tenant_id), merchant_account = %tenant.merchant_account, "authorizer: token accepted");

        Ok(Decision::Token {
            principal: claims.principal(),
            tenant_id,
        })
    }
}
