//! HMAC-SHA256 verification of Adyen notification items.
//!
//! Adyen signs each notification item over a colon-joined string of eight fields:
//!
//! ```text
//! pspReference:originalReference:merchantAccountCode:merchantReference:amount.value:amount.currency:eventCode:success
//! ```
//!
//! - Absent fields become the empty string
//! - Backslashes and colons inside a field are escaped (`\` → `\\`, `:` → `\:`)
//! - `success` is normalized to `true` or `false`
//! - The signature is the base64-encoded HMAC-SHA256 of that string
//!
//! The key is hex-encoded in the Adyen customer area. Some tenants were provisioned with
//! base64-encoded keys instead, so the encoding is an explicit [`KeyEncoding`] setting.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// How the tenant's HMAC key is encoded in the secret store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEncoding {
    /// Hex string, as issued by the Adyen customer area
    #[default]
    Hex,
    /// Standard base64
    Base64,
}

/// Errors raised while preparing a signing key.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("HMAC key is empty")]
    EmptyKey,

    #[error("HMAC key is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("HMAC key is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("HMAC key has an unusable length")]
    InvalidKeyLength,
}

/// The eight notification fields covered by the signature.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignedFields<'a> {
    pub psp_reference: Option<&'a str>,
    pub original_reference: Option<&'a str>,
    pub merchant_account_code: Option<&'a str>,
    pub merchant_reference: Option<&'a str>,
    pub amount_value: Option<i64>,
    pub amount_currency: Option<&'a str>,
    pub event_code: Option<&'a str>,
    pub success: Option<&'a str>,
}

/// Escape a single field so that it cannot introduce a separator.
fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace(':', "\\:")
}

/// Normalize the `success` flag: anything other than a case-insensitive `true` is `false`.
fn normalize_success(success: Option<&str>) -> &'static str {
    match success {
        Some(s) if s.eq_ignore_ascii_case("true") => "true",
        _ => "false",
    }
}

/// Build the canonical string that is fed to the MAC.
pub fn canonicalize(fields: &SignedFields<'_>) -> String {
    let amount_value = fields.amount_value.map(|v| v.to_string()).unwrap_or_default();

    [
        escape(fields.psp_reference.unwrap_or_default()),
        escape(fields.original_reference.unwrap_or_default()),
        escape(fields.merchant_account_code.unwrap_or_default()),
        escape(fields.merchant_reference.unwrap_or_default()),
        escape(&amount_value),
        escape(fields.amount_currency.unwrap_or_default()),
        escape(fields.event_code.unwrap_or_default()),
        escape(normalize_success(fields.success)),
    ]
    .join(":")
}

/// Decode the raw key bytes according to the configured encoding.
pub fn decode_key(key: &str, encoding: KeyEncoding) -> Result<Vec<u8>, SigningError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(SigningError::EmptyKey);
    }

    let bytes = match encoding {
        KeyEncoding::Hex => hex::decode(key)?,
        KeyEncoding::Base64 => BASE64_STANDARD.decode(key)?,
    };

    if bytes.is_empty() {
        return Err(SigningError::EmptyKey);
    }
    Ok(bytes)
}

/// Compute the base64 signature for a set of fields.
pub fn compute_signature(fields: &SignedFields<'_>, key: &str, encoding: KeyEncoding) -> Result<String, SigningError> {
    let key_bytes = decode_key(key, encoding)?;

    let mut mac = HmacSha256::new_from_slice(&key_bytes).map_err(|_| SigningError::InvalidKeyLength)?;
    mac.update(canonicalize(fields).as_bytes());
    let signature = mac.finalize().into_bytes();

    Ok(BASE64_STANDARD.encode(signature))
}

/// Verify a notification signature.
///
/// Returns `false` for a wrong signature, a missing signature or a malformed key. The
/// comparison runs in constant time with respect to the signature contents.
pub fn verify_signature(fields: &SignedFields<'_>, signature: &str, key: &str, encoding: KeyEncoding) -> bool {
    if signature.is_empty() {
        return false;
    }

    let expected = match compute_signature(fields, key, encoding) {
        Ok(expected) => expected,
        Err(e) => {
            tracing::warn!(error = %e, "Unable to compute HMAC signature");
            return false;
        }
    };

    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}
