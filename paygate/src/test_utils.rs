//! In-memory stores and fixtures for unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::auth::Authorizer;
use crate::config::{AuthorizerConfig, WebhooksConfig};
use crate::db::errors::{DbError, Result};
use crate::db::handlers::{TenantStore, TransactionStore};
use crate::db::models::tenants::Tenant;
use crate::db::models::transactions::{StatusUpdate, TransactionRef};
use crate::secrets::cache::KeyCache;
use crate::secrets::memory::StaticSecretStore;
use crate::secrets::{self, SecretStore};
use crate::types::TenantId;
use crate::webhooks::WebhookProcessor;
use crate::webhooks::signing::{KeyEncoding, SignedFields, compute_signature};
use crate::{AppState, build_router};

pub fn test_tenant(merchant_account: &str) -> Tenant {
    Tenant {
        tenant_id: Uuid::new_v4(),
        merchant_account: merchant_account.to_string(),
        secret_name: None,
    }
}

/// Tenant lookups against a fixed list. Merchant account matching is exact, as in Postgres.
#[derive(Debug, Default)]
pub struct InMemoryTenants {
    tenants: Vec<Tenant>,
    failing: bool,
    lookups: AtomicUsize,
}

impl InMemoryTenants {
    pub fn new(tenants: Vec<Tenant>) -> Self {
        Self {
            tenants,
            ..Default::default()
        }
    }

    /// Every lookup fails with a transient database error
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn lookup(&self, matches: impl Fn(&Tenant) -> bool) -> Result<Option<Tenant>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(DbError::from(sqlx::Error::PoolTimedOut));
        }
        Ok(self.tenants.iter().find(|t| matches(t)).cloned())
    }
}

#[async_trait]
impl TenantStore for InMemoryTenants {
    async fn by_merchant_account(&self, merchant_account: &str) -> Result<Option<Tenant>> {
        self.lookup(|t| t.merchant_account == merchant_account)
    }

    async fn by_id(&self, tenant_id: TenantId) -> Result<Option<Tenant>> {
        self.lookup(|t| t.tenant_id == tenant_id)
    }
}

/// Transactions keyed by merchant reference; applied updates are recorded for inspection.
#[derive(Debug, Default)]
pub struct InMemoryTransactions {
    by_reference: HashMap<String, TransactionRef>,
    fail_updates: bool,
    lookups: AtomicUsize,
    updates: Mutex<Vec<StatusUpdate>>,
}

impl InMemoryTransactions {
    pub fn with_transaction(mut self, merchant_reference: &str, tenant_id: TenantId) -> Self {
        self.by_reference.insert(
            merchant_reference.to_string(),
            TransactionRef {
                transaction_id: Uuid::new_v4(),
                tenant_id,
            },
        );
        self
    }

    /// Status updates fail with a transient database error; lookups still succeed
    pub fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> Vec<StatusUpdate> {
        self.updates.lock().expect("updates lock poisoned").clone()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactions {
    async fn find_by_merchant_reference(&self, merchant_reference: &str) -> Result<Option<TransactionRef>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.by_reference.get(merchant_reference).cloned())
    }

    async fn apply_webhook_status(&self, update: &StatusUpdate) -> Result<bool> {
        if self.fail_updates {
            return Err(DbError::from(sqlx::Error::PoolTimedOut));
        }
        let mut updates = self.updates.lock().expect("updates lock poisoned");
        let first = !updates.iter().any(|u| u.psp_reference == update.psp_reference);
        updates.push(update.clone());
        Ok(first)
    }
}

/// Counts calls through to a [`StaticSecretStore`].
#[derive(Debug)]
pub struct CountingSecretStore {
    inner: StaticSecretStore,
    fetches: AtomicUsize,
}

impl CountingSecretStore {
    pub fn new(inner: StaticSecretStore) -> Self {
        Self {
            inner,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for CountingSecretStore {
    async fn get_secret(&self, name: &str) -> secrets::Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.get_secret(name).await
    }
}

/// A one-item notification for 10.00 USD, signed with a hex key.
pub fn signed_notification(merchant_account: &str, merchant_reference: &str, event_code: &str, success: &str, hex_key: &str) -> Value {
    let psp_reference = "8815000000000001";
    let fields = SignedFields {
        psp_reference: Some(psp_reference),
        original_reference: None,
        merchant_account_code: Some(merchant_account),
        merchant_reference: Some(merchant_reference),
        amount_value: Some(1000),
        amount_currency: Some("USD"),
        event_code: Some(event_code),
        success: Some(success),
    };
    let signature = compute_signature(&fields, hex_key, KeyEncoding::Hex).expect("test key must be valid hex");

    json!({
        "live": "false",
        "notificationItems": [
            {
                "NotificationRequestItem": {
                    "additionalData": { "hmacSignature": signature },
                    "amount": { "currency": "USD", "value": 1000 },
                    "eventCode": event_code,
                    "eventDate": "2025-06-01T12:00:00+00:00",
                    "merchantAccountCode": merchant_account,
                    "merchantReference": merchant_reference,
                    "paymentMethod": "visa",
                    "pspReference": psp_reference,
                    "success": success
                }
            }
        ]
    })
}

/// Router over in-memory stores, for handler tests.
pub fn create_test_server(
    tenants: Vec<Tenant>,
    transactions: Arc<InMemoryTransactions>,
    secrets: StaticSecretStore,
    webhooks: WebhooksConfig,
) -> TestServer {
    let tenants: Arc<dyn TenantStore> = Arc::new(InMemoryTenants::new(tenants));
    let secrets: Arc<dyn SecretStore> = Arc::new(secrets);

    let state = AppState::builder()
        .authorizer(Authorizer::new(tenants.clone(), secrets.clone(), AuthorizerConfig::default()))
        .processor(WebhookProcessor::new(
            tenants,
            transactions,
            secrets,
            KeyCache::new(100, Duration::from_secs(60)),
            webhooks,
        ))
        .build();

    TestServer::new(build_router(state)).expect("Failed to create test server")
}
