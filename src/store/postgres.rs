//! Postgres implementation of [`TransactionStore`].

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Page, StoreError, TransactionFilter, TransactionStore};
use crate::domain::{Amount, StatusEntry, TransactionRecord};

const COLUMNS: &str = "id, tx_hash, tx_type, status, amount, currency, wallet_address, \
     source_id, source_type, status_history, metadata, created_at, updated_at, last_checked";

#[derive(Clone)]
pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn insert(&self, record: &TransactionRecord) -> Result<TransactionRecord, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            INSERT INTO transactions (
                id, tx_hash, tx_type, status, amount, currency, wallet_address,
                source_id, source_type, status_history, metadata,
                created_at, updated_at, last_checked
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(record.id)
        .bind(&record.tx_hash)
        .bind(record.tx_type.as_str())
        .bind(record.status.as_str())
        .bind(record.amount.as_ref().map(|a| a.value.clone()))
        .bind(record.amount.as_ref().map(|a| a.currency.clone()))
        .bind(&record.wallet_address)
        .bind(&record.source_id)
        .bind(&record.source_type)
        .bind(Json(&record.status_history))
        .bind(&record.metadata)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.last_checked)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(e, record.tx_hash.as_deref()))?;

        row.into_domain()
    }

    async fn find_by_hash(&self, tx_hash: &str) -> Result<Option<TransactionRecord>, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE tx_hash = $1",
            COLUMNS
        ))
        .bind(tx_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TransactionRecord>, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM transactions WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(TransactionRow::into_domain).transpose()
    }

    async fn list(
        &self,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let mut query = sqlx::QueryBuilder::new(format!(
            "SELECT {} FROM transactions WHERE 1 = 1",
            COLUMNS
        ));

        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(source_type) = &filter.source_type {
            query.push(" AND source_type = ").push_bind(source_type);
        }
        if let Some(source_id) = &filter.source_id {
            query.push(" AND source_id = ").push_bind(source_id);
        }
        if let Some(user_id) = &filter.user_id {
            query.push(" AND metadata->>'user_id' = ").push_bind(user_id);
        }

        query
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = query
            .build_query_as::<TransactionRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.into_iter().map(TransactionRow::into_domain).collect()
    }

    async fn replace(
        &self,
        id: Uuid,
        record: &TransactionRecord,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<TransactionRecord, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            r#"
            UPDATE transactions SET
                tx_hash = $3, status = $4, amount = $5, currency = $6,
                wallet_address = $7, source_id = $8, source_type = $9,
                status_history = $10, metadata = $11,
                updated_at = $12, last_checked = $13
            WHERE id = $1 AND updated_at = $2
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(id)
        .bind(expected_updated_at)
        .bind(&record.tx_hash)
        .bind(record.status.as_str())
        .bind(record.amount.as_ref().map(|a| a.value.clone()))
        .bind(record.amount.as_ref().map(|a| a.currency.clone()))
        .bind(&record.wallet_address)
        .bind(&record.source_id)
        .bind(&record.source_type)
        .bind(Json(&record.status_history))
        .bind(&record.metadata)
        .bind(record.updated_at)
        .bind(record.last_checked)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(e, record.tx_hash.as_deref()))?;

        match row {
            Some(row) => row.into_domain(),
            // Distinguish a stale token from a missing record.
            None => {
                let exists = sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM transactions WHERE id = $1",
                )
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?;

                if exists > 0 {
                    Err(StoreError::Conflict)
                } else {
                    Err(StoreError::NotFound(id.to_string()))
                }
            }
        }
    }
}

fn map_write_error(err: sqlx::Error, tx_hash: Option<&str>) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            return StoreError::Duplicate(tx_hash.unwrap_or("<unknown>").to_string());
        }
    }
    StoreError::Backend(err.to_string())
}

/// Internal row type for SQLx. Not exposed outside the store.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    tx_hash: Option<String>,
    tx_type: String,
    status: String,
    amount: Option<BigDecimal>,
    currency: Option<String>,
    wallet_address: Option<String>,
    source_id: Option<String>,
    source_type: Option<String>,
    status_history: Json<Vec<StatusEntry>>,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_checked: Option<DateTime<Utc>>,
}

impl TransactionRow {
    fn into_domain(self) -> Result<TransactionRecord, StoreError> {
        let tx_type = self
            .tx_type
            .parse()
            .map_err(|e: String| StoreError::Backend(e))?;
        let status = self
            .status
            .parse()
            .map_err(|e: String| StoreError::Backend(e))?;

        let amount = match (self.amount, self.currency) {
            (Some(value), Some(currency)) => Some(Amount { value, currency }),
            _ => None,
        };

        Ok(TransactionRecord {
            id: self.id,
            tx_hash: self.tx_hash,
            tx_type,
            status,
            amount,
            wallet_address: self.wallet_address,
            source_id: self.source_id,
            source_type: self.source_type,
            status_history: self.status_history.0,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_checked: self.last_checked,
        })
    }
}
