//! Transaction lookups and the webhook status projection.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use crate::db::errors::Result;
use crate::db::models::transactions::{StatusUpdate, TransactionRef};
use crate::db::retry::{RetryPolicy, with_retry};
use crate::types::abbrev_uuid;

/// Access to the `transactions` and `operations` tables.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Find the transaction created for a merchant reference.
    async fn find_by_merchant_reference(&self, merchant_reference: &str) -> Result<Option<TransactionRef>>;

    /// Write the status projection and record the operation.
    ///
    /// Returns `false` when an operation with the same PSP reference was already recorded;
    /// the status update is applied either way.
    async fn apply_webhook_status(&self, update: &StatusUpdate) -> Result<bool>;
}

/// Postgres-backed [`TransactionStore`].
#[derive(Debug, Clone)]
pub struct PgTransactions {
    db: PgPool,
    retry: RetryPolicy,
}

impl PgTransactions {
    pub fn new(db: PgPool, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    async fn apply_once(&self, update: &StatusUpdate) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            UPDATE transactions
            SET status = $1,
                psp_reference = COALESCE($2, psp_reference),
                result_code = $3,
                refusal_reason = NULL,
                updated_at = NOW()
            WHERE transaction_id = $4
            "#,
        )
        .bind(update.status)
        .bind(update.psp_reference.as_deref())
        .bind(&update.event_code)
        .bind(update.transaction.transaction_id)
        .execute(&mut *tx)
        .await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO operations (
                operation_id, transaction_id, tenant_id, psp_reference,
                operation_type, status, amount_value, currency_code, raw_payload
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (psp_reference) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(update.transaction.transaction_id)
        .bind(update.transaction.tenant_id)
        .bind(update.psp_reference.as_deref())
        .bind(update.operation_type())
        .bind(update.status)
        .bind(update.amount_value)
        .bind(update.currency_code.as_deref())
        .bind(&update.raw_payload)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        tx.commit().await?;
        Ok(inserted)
    }
}

#[async_trait]
impl TransactionStore for PgTransactions {
    #[instrument(skip(self), err)]
    async fn find_by_merchant_reference(&self, merchant_reference: &str) -> Result<Option<TransactionRef>> {
        with_retry(&self.retry, "transactions.find_by_merchant_reference", || async move {
            let found = sqlx::query_as::<_, TransactionRef>(
                r#"
                SELECT transaction_id, tenant_id
                FROM transactions
                WHERE merchant_reference = $1
                ORDER BY created_at DESC
                LIMIT 1
                "#,
            )
            .bind(merchant_reference)
            .fetch_optional(&self.db)
            .await?;
            Ok(found)
        })
        .await
    }

    #[instrument(
        skip(self, update),
        fields(
            transaction_id = %abbrev_uuid(&update.transaction.transaction_id),
            status = %update.status,
        ),
        err
    )]
    async fn apply_webhook_status(&self, update: &StatusUpdate) -> Result<bool> {
        with_retry(&self.retry, "transactions.apply_webhook_status", || self.apply_once(update)).await
    }
}
