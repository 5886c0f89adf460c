//! Processing of Adyen notification batches.
//!
//! Each item is verified against its merchant's HMAC key and, when database writes are
//! enabled, projected onto the matching transaction. Nothing here fails the request: Adyen
//! retries anything that is not acknowledged, so every outcome is logged and the batch is
//! always accepted.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::WebhooksConfig;
use crate::db::handlers::{TenantStore, TransactionStore};
use crate::db::models::transactions::StatusUpdate;
use crate::secrets::cache::KeyCache;
use crate::secrets::{SecretStore, load_tenant_secret};
use crate::types::abbrev_uuid;
use crate::webhooks::events::{NotificationRequest, NotificationRequestItem};
use crate::webhooks::signing::verify_signature;

/// What happened to a notification batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingSummary {
    /// The body was not a notification document
    pub malformed: bool,
    pub items: usize,
    /// Containers without a `NotificationRequestItem`
    pub missing: usize,
    pub invalid_signature: usize,
    /// Items that passed verification, or were let through with verification not required
    pub accepted: usize,
    /// Transactions whose status was updated
    pub updated: usize,
    /// Items whose database work failed
    pub failed: usize,
}

/// Verifies notification items and applies them to stored transactions.
#[derive(Clone)]
pub struct WebhookProcessor {
    tenants: Arc<dyn TenantStore>,
    transactions: Arc<dyn TransactionStore>,
    secrets: Arc<dyn SecretStore>,
    key_cache: KeyCache,
    config: WebhooksConfig,
}

impl WebhookProcessor {
    pub fn new(
        tenants: Arc<dyn TenantStore>,
        transactions: Arc<dyn TransactionStore>,
        secrets: Arc<dyn SecretStore>,
        key_cache: KeyCache,
        config: WebhooksConfig,
    ) -> Self {
        Self {
            tenants,
            transactions,
            secrets,
            key_cache,
            config,
        }
    }

    /// Process a raw notification body.
    #[instrument(skip_all, fields(correlation_id = %Uuid::new_v4()))]
    pub async fn process(&self, body: &[u8]) -> ProcessingSummary {
        let started = Instant::now();
        info!(bytes = body.len(), "Webhook request started");

        let summary = match serde_json::from_slice::<NotificationRequest>(body) {
            Ok(notification) => self.process_notification(notification).await,
            Err(e) => {
                warn!(error = %e, "Webhook body is not a notification document");
                ProcessingSummary {
                    malformed: true,
                    ..Default::default()
                }
            }
        };

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            items = summary.items,
            accepted = summary.accepted,
            invalid_signature = summary.invalid_signature,
            updated = summary.updated,
            failed = summary.failed,
            "Webhook processed"
        );
        summary
    }

    async fn process_notification(&self, notification: NotificationRequest) -> ProcessingSummary {
        let mut summary = ProcessingSummary::default();

        let containers = notification.notification_items.unwrap_or_default();
        if containers.is_empty() {
            warn!("No notificationItems in payload");
            return summary;
        }
        summary.items = containers.len();

        for container in containers {
            let Some(item) = container.item else {
                warn!("Notification item missing");
                summary.missing += 1;
                continue;
            };

            if !self.verify(&item).await {
                summary.invalid_signature += 1;
                warn!(
                    event_code = ?item.event_code,
                    psp_reference = ?item.psp_reference,
                    merchant_account = ?item.merchant_account_code,
                    "Invalid HMAC signature"
                );
                if self.config.require_valid_hmac {
                    continue;
                }
                debug!("Processing item despite invalid signature, verification not required");
            }
            summary.accepted += 1;

            info!(
                event_code = ?item.event_code,
                success = ?item.success,
                psp_reference = ?item.psp_reference,
                original_reference = ?item.original_reference,
                merchant_reference = ?item.merchant_reference,
                "Webhook item accepted"
            );

            if !self.config.enable_db_writes {
                continue;
            }

            match self.apply(&item).await {
                Ok(true) => summary.updated += 1,
                Ok(false) => {}
                Err(e) => {
                    summary.failed += 1;
                    warn!(error = %e, merchant_reference = ?item.merchant_reference, "Failed to apply webhook item");
                }
            }
        }

        summary
    }

    async fn verify(&self, item: &NotificationRequestItem) -> bool {
        let Some(signature) = item.hmac_signature().filter(|s| !s.is_empty()) else {
            return false;
        };

        let key = match item.merchant_account_code.as_deref() {
            Some(merchant) => self.tenant_hmac_key(merchant).await,
            None => None,
        };
        let Some(key) = key.or_else(|| self.config.fallback_hmac_key.clone()) else {
            warn!(merchant_account = ?item.merchant_account_code, "No HMAC key available");
            return false;
        };

        verify_signature(&item.signed_fields(), signature, &key, self.config.hmac_key_encoding)
    }

    /// The tenant's HMAC key, served from the cache when possible. Lookup failures are logged
    /// and yield `None` so the caller can fall back to the global key.
    async fn tenant_hmac_key(&self, merchant_account: &str) -> Option<String> {
        let merchant_account = merchant_account.trim();
        if merchant_account.is_empty() {
            return None;
        }

        if let Some(key) = self.key_cache.get(merchant_account).await {
            return Some(key);
        }

        let secret_name = match self.tenants.secret_name_for(merchant_account).await {
            Ok(Some(name)) => name,
            Ok(None) => {
                debug!(merchant_account, "No tenant for merchant account");
                return None;
            }
            Err(e) => {
                warn!(merchant_account, error = %e, "Failed to resolve tenant secret name");
                return None;
            }
        };

        match load_tenant_secret(self.secrets.as_ref(), &secret_name).await {
            Ok(secret) => {
                let Some(key) = secret.adyen_hmac_key else {
                    warn!(merchant_account, secret_name, "Tenant secret has no adyenHmacKey");
                    return None;
                };
                self.key_cache.insert(merchant_account, key.clone()).await;
                Some(key)
            }
            Err(e) => {
                warn!(merchant_account, secret_name, error = %e, "Failed to read tenant secret");
                None
            }
        }
    }

    /// Project the item onto its transaction. Returns whether a status was written.
    async fn apply(&self, item: &NotificationRequestItem) -> crate::db::errors::Result<bool> {
        let (Some(merchant_reference), Some(event_code)) = (
            item.merchant_reference.as_deref().filter(|s| !s.is_empty()),
            item.event_code.as_deref().filter(|s| !s.is_empty()),
        ) else {
            return Ok(false);
        };

        let Some(transaction) = self.transactions.find_by_merchant_reference(merchant_reference).await? else {
            debug!(merchant_reference, "No transaction for merchant reference");
            return Ok(false);
        };

        let Some(status) = item.transaction_status() else {
            debug!(event_code, "Event does not change transaction status");
            return Ok(false);
        };

        let update = StatusUpdate {
            transaction,
            status,
            event_code: event_code.to_string(),
            psp_reference: item.psp_reference.clone(),
            amount_value: item.amount.as_ref().and_then(|a| a.value),
            currency_code: item.amount.as_ref().and_then(|a| a.currency.clone()),
            raw_payload: serde_json::to_value(item).map_err(anyhow::Error::from)?,
        };

        let recorded = self.transactions.apply_webhook_status(&update).await?;
        info!(
            transaction_id = %abbrev_uuid(&update.transaction.transaction_id),
            status = %status,
            operation_recorded = recorded,
            "Transaction updated from webhook"
        );
        Ok(true)
    }
}
