//! Persistence port for transaction records.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryTransactionStore;
pub use postgres::PgTransactionStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{TransactionRecord, TxStatus};

pub const DEFAULT_PAGE_LIMIT: i64 = 50;
pub const MAX_PAGE_LIMIT: i64 = 200;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("concurrent update conflict")]
    Conflict,
    #[error("duplicate transaction hash: {0}")]
    Duplicate(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Listing filters. `user_id` matches the owning user recorded in the
/// metadata bag; `source_*` matches the originating domain object (e.g. a
/// campaign or a donation row).
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub status: Option<TxStatus>,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
    pub user_id: Option<String>,
}

/// Page + limit pagination, newest records first.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Page {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// Storage operations the service depends on. `replace` is a whole-record
/// conditional update keyed on the previously read `updated_at`, so two
/// racing writers cannot both commit against the same snapshot.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, record: &TransactionRecord) -> Result<TransactionRecord, StoreError>;

    async fn find_by_hash(&self, tx_hash: &str) -> Result<Option<TransactionRecord>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TransactionRecord>, StoreError>;

    async fn list(
        &self,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<Vec<TransactionRecord>, StoreError>;

    async fn replace(
        &self,
        id: Uuid,
        record: &TransactionRecord,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<TransactionRecord, StoreError>;
}
