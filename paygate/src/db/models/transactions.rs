//! Database models for payment transactions and their webhook-driven operations.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{TenantId, TransactionId};

/// The columns needed to project a webhook onto a transaction.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct TransactionRef {
    pub transaction_id: TransactionId,
    pub tenant_id: TenantId,
}

/// Statuses written by webhook processing. The `payment_status` enum in Postgres also
/// carries the statuses set by the payment API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status")]
pub enum TransactionStatus {
    Authorised,
    Refused,
    Captured,
    Cancelled,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authorised => "Authorised",
            Self::Refused => "Refused",
            Self::Captured => "Captured",
            Self::Cancelled => "Cancelled",
            Self::Refunded => "Refunded",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything written for one verified notification item: the status projection on the
/// transaction and the operation audit row.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub transaction: TransactionRef,
    pub status: TransactionStatus,
    pub event_code: String,
    pub psp_reference: Option<String>,
    pub amount_value: Option<i64>,
    pub currency_code: Option<String>,
    /// The notification item exactly as received
    pub raw_payload: serde_json::Value,
}

impl StatusUpdate {
    /// `operation_type` recorded on the audit row
    pub fn operation_type(&self) -> String {
        format!("WEBHOOK_{}", self.event_code)
    }
}
