//! Tenant lookups.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use crate::db::errors::Result;
use crate::db::models::tenants::Tenant;
use crate::db::retry::{RetryPolicy, with_retry};
use crate::types::{TenantId, abbrev_uuid};

/// Read access to the `tenants` table.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Find the tenant owning a merchant account.
    async fn by_merchant_account(&self, merchant_account: &str) -> Result<Option<Tenant>>;

    /// Find a tenant by ID.
    async fn by_id(&self, tenant_id: TenantId) -> Result<Option<Tenant>>;

    /// Name of the secret holding a merchant account's configuration, or `None` when the
    /// merchant account is unknown.
    async fn secret_name_for(&self, merchant_account: &str) -> Result<Option<String>> {
        Ok(self
            .by_merchant_account(merchant_account)
            .await?
            .map(|tenant| tenant.resolved_secret_name()))
    }
}

/// Postgres-backed [`TenantStore`].
#[derive(Debug, Clone)]
pub struct PgTenants {
    db: PgPool,
    retry: RetryPolicy,
}

impl PgTenants {
    pub fn new(db: PgPool, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }
}

#[async_trait]
impl TenantStore for PgTenants {
    #[instrument(skip(self), err)]
    async fn by_merchant_account(&self, merchant_account: &str) -> Result<Option<Tenant>> {
        with_retry(&self.retry, "tenants.by_merchant_account", || async move {
            let tenant = sqlx::query_as::<_, Tenant>(
                r#"
                SELECT tenant_id, merchant_account, secret_name
                FROM tenants
                WHERE merchant_account = $1
                LIMIT 1
                "#,
            )
            .bind(merchant_account)
            .fetch_optional(&self.db)
            .await?;
            Ok(tenant)
        })
        .await
    }

    #[instrument(skip(self), fields(tenant_id = %abbrev_uuid(&tenant_id)), err)]
    async fn by_id(&self, tenant_id: TenantId) -> Result<Option<Tenant>> {
        with_retry(&self.retry, "tenants.by_id", || async move {
            let tenant = sqlx::query_as::<_, Tenant>(
                r#"
                SELECT tenant_id, merchant_account, secret_name
                FROM tenants
                WHERE tenant_id = $1
                "#,
            )
            .bind(tenant_id)
            .fetch_optional(&self.db)
            .await?;
            Ok(tenant)
        })
        .await
    }
}
