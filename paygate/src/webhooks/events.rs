//! Adyen standard notification payloads.
//!
//! ```json
//! {
//!   "live": "false",
//!   "notificationItems": [
//!     {
//!       "NotificationRequestItem": {
//!         "eventCode": "AUTHORISATION",
//!         "success": "true",
//!         "merchantAccountCode": "TestMerchant",
//!         "merchantReference": "Order-123",
//!         "pspReference": "7914073381342284",
//!         "amount": { "value": 1130, "currency": "EUR" },
//!         "additionalData": { "hmacSignature": "..." }
//!       }
//!     }
//!   ]
//! }
//! ```
//!
//! Fields not used here are kept in `extra` so the item can be stored exactly as received.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::db::models::transactions::TransactionStatus;
use crate::webhooks::signing::SignedFields;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    #[serde(default)]
    pub notification_items: Option<Vec<NotificationItemContainer>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationItemContainer {
    #[serde(rename = "NotificationRequestItem", default)]
    pub item: Option<NotificationRequestItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequestItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_account_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psp_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<NotificationAmount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<AdditionalData>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationAmount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac_signature: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NotificationRequestItem {
    /// The fields covered by the HMAC signature
    pub fn signed_fields(&self) -> SignedFields<'_> {
        SignedFields {
            psp_reference: self.psp_reference.as_deref(),
            original_reference: self.original_reference.as_deref(),
            merchant_account_code: self.merchant_account_code.as_deref(),
            merchant_reference: self.merchant_reference.as_deref(),
            amount_value: self.amount.as_ref().and_then(|a| a.value),
            amount_currency: self.amount.as_ref().and_then(|a| a.currency.as_deref()),
            event_code: self.event_code.as_deref(),
            success: self.success.as_deref(),
        }
    }

    pub fn hmac_signature(&self) -> Option<&str> {
        self.additional_data.as_ref().and_then(|d| d.hmac_signature.as_deref())
    }

    pub fn is_success(&self) -> bool {
        self.success.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("true"))
    }

    fn is_failure(&self) -> bool {
        self.success.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("false"))
    }

    /// The transaction status this notification implies, if any.
    ///
    /// An authorisation outcome needs an explicit `success`; anything else leaves the status alone.
    pub fn transaction_status(&self) -> Option<TransactionStatus> {
        match self.event_code.as_deref()? {
            "AUTHORISATION" if self.is_success() => Some(TransactionStatus::Authorised),
            "AUTHORISATION" if self.is_failure() => Some(TransactionStatus::Refused),
            "AUTHORISATION" => None,
            "CAPTURE" => Some(TransactionStatus::Captured),
            "CANCELLATION" => Some(TransactionStatus::Cancelled),
            "REFUND" => Some(TransactionStatus::Refunded),
            _ => None,
        }
    }
}
