//! Tenant configuration held in a secret store.
//!
//! Every tenant (merchant account) owns one secret, named `tenant-{merchantAccount}-config`
//! unless the `tenants` row says otherwise. Its value is a JSON document:
//!
//! ```json
//! {
//!   "adyenAPIKey": "...",
//!   "adyenClientKey": "...",
//!   "adyenHmacKey": "00112233...",
//!   "ipAllowlist": ["203.0.113.0/24", "198.51.100.7"],
//!   "apiKey": "pk_live_...",
//!   "apiKeys": ["pk_live_old", "pk_live_new"]
//! }
//! ```
//!
//! The [`SecretStore`] trait abstracts where secrets live. [`aws::AwsSecretStore`] reads AWS
//! Secrets Manager; [`memory::StaticSecretStore`] serves values from configuration for local
//! development and tests. Resolved HMAC keys are memoized by [`cache::KeyCache`].

use async_trait::async_trait;
use serde::Deserialize;
use subtle::ConstantTimeEq;

pub mod aws;
pub mod cache;
pub mod memory;

/// Result type for secret store operations
pub type Result<T> = std::result::Result<T, SecretError>;

/// Errors that can occur while reading a secret
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("secret '{0}' not found")]
    NotFound(String),

    #[error("secret store error: {0}")]
    Provider(String),

    #[error("secret '{name}' is malformed: {reason}")]
    Malformed { name: String, reason: String },
}

/// Read access to named secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch the raw string value of a secret.
    async fn get_secret(&self, name: &str) -> Result<String>;
}

/// Conventional secret name for a merchant account.
pub fn tenant_secret_name(merchant_account: &str) -> String {
    format!("tenant-{}-config", merchant_account.trim())
}

/// Extract the JWT signing key from a secret value.
///
/// The value is either the raw key, or a JSON object carrying it under `secret`. A JSON
/// document without `secret` is used verbatim.
pub fn jwt_secret_from_value(value: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(value)
        && let Some(secret) = map.get("secret").and_then(|s| s.as_str())
    {
        return secret.to_string();
    }
    value.to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTenantSecret {
    #[serde(rename = "adyenAPIKey")]
    adyen_api_key: Option<String>,
    adyen_client_key: Option<String>,
    adyen_hmac_key: Option<String>,
    #[serde(default)]
    ip_allowlist: Vec<String>,
    api_key: Option<String>,
    #[serde(default)]
    api_keys: Vec<String>,
}

/// A tenant's configuration, validated at load time.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TenantSecret {
    pub adyen_api_key: Option<String>,
    pub adyen_client_key: Option<String>,
    pub adyen_hmac_key: Option<String>,
    /// Literal IPs and CIDR ranges; blank entries removed
    pub ip_allowlist: Vec<String>,
    /// Accepted API keys from both `apiKey` and `apiKeys`, byte-exact; blank entries removed
    pub api_keys: Vec<String>,
}

// Keys never reach the logs
impl std::fmt::Debug for TenantSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantSecret")
            .field("has_adyen_api_key", &self.adyen_api_key.is_some())
            .field("has_adyen_client_key", &self.adyen_client_key.is_some())
            .field("has_adyen_hmac_key", &self.adyen_hmac_key.is_some())
            .field("ip_allowlist", &self.ip_allowlist)
            .field("api_key_count", &self.api_keys.len())
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl TenantSecret {
    /// Parse a secret value. `name` is only used for error reporting.
    pub fn parse(name: &str, value: &str) -> Result<Self> {
        let raw: RawTenantSecret = serde_json::from_str(value).map_err(|e| SecretError::Malformed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let api_keys = raw
            .api_key
            .into_iter()
            .chain(raw.api_keys)
            .filter(|k| !k.trim().is_empty())
            .collect();

        let ip_allowlist = raw
            .ip_allowlist
            .into_iter()
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect();

        Ok(Self {
            adyen_api_key: non_blank(raw.adyen_api_key),
            adyen_client_key: non_blank(raw.adyen_client_key),
            adyen_hmac_key: non_blank(raw.adyen_hmac_key),
            ip_allowlist,
            api_keys,
        })
    }

    /// Whether `candidate` equals one of the tenant's API keys.
    ///
    /// Every configured key is compared, so timing does not reveal which one matched.
    pub fn accepts_api_key(&self, candidate: &str) -> bool {
        if candidate.is_empty() {
            return false;
        }

        self.api_keys
            .iter()
            .fold(subtle::Choice::from(0u8), |acc, key| {
                acc | key.as_bytes().ct_eq(candidate.as_bytes())
            })
            .into()
    }
}

/// Load and parse a tenant's secret.
pub async fn load_tenant_secret(store: &dyn SecretStore, name: &str) -> Result<TenantSecret> {
    let value = store.get_secret(name).await?;
    TenantSecret::parse(name, &value)
}
