//! In-memory implementation of [`TransactionStore`].
//!
//! Mirrors the Postgres store's semantics (hash uniqueness, conditional
//! replace) so service and API tests can run without a live database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Page, StoreError, TransactionFilter, TransactionStore};
use crate::domain::TransactionRecord;

#[derive(Default)]
pub struct InMemoryTransactionStore {
    records: RwLock<HashMap<Uuid, TransactionRecord>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn matches(record: &TransactionRecord, filter: &TransactionFilter) -> bool {
    if let Some(status) = filter.status {
        if record.status != status {
            return false;
        }
    }
    if let Some(source_type) = &filter.source_type {
        if record.source_type.as_deref() != Some(source_type.as_str()) {
            return false;
        }
    }
    if let Some(source_id) = &filter.source_id {
        if record.source_id.as_deref() != Some(source_id.as_str()) {
            return false;
        }
    }
    if let Some(user_id) = &filter.user_id {
        let owner = record
            .metadata
            .as_ref()
            .and_then(|m| m.get("user_id"))
            .and_then(|v| v.as_str());
        if owner != Some(user_id.as_str()) {
            return false;
        }
    }
    true
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn insert(&self, record: &TransactionRecord) -> Result<TransactionRecord, StoreError> {
        let mut records = self.records.write().await;

        if let Some(hash) = &record.tx_hash {
            if records.values().any(|r| r.tx_hash.as_ref() == Some(hash)) {
                return Err(StoreError::Duplicate(hash.clone()));
            }
        }

        records.insert(record.id, record.clone());
        Ok(record.clone())
    }

    async fn find_by_hash(&self, tx_hash: &str) -> Result<Option<TransactionRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.tx_hash.as_deref() == Some(tx_hash))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TransactionRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&id).cloned())
    }

    async fn list(
        &self,
        filter: &TransactionFilter,
        page: Page,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let records = self.records.read().await;

        let mut selected: Vec<TransactionRecord> = records
            .values()
            .filter(|r| matches(r, filter))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = page.offset() as usize;
        Ok(selected
            .into_iter()
            .skip(offset)
            .take(page.limit as usize)
            .collect())
    }

    async fn replace(
        &self,
        id: Uuid,
        record: &TransactionRecord,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<TransactionRecord, StoreError> {
        let mut records = self.records.write().await;

        if let Some(hash) = &record.tx_hash {
            if records
                .values()
                .any(|r| r.id != id && r.tx_hash.as_ref() == Some(hash))
            {
                return Err(StoreError::Duplicate(hash.clone()));
            }
        }

        match records.get_mut(&id) {
            Some(existing) if existing.updated_at == expected_updated_at => {
                *existing = record.clone();
                Ok(record.clone())
            }
            Some(_) => Err(StoreError::Conflict),
            None => Err(StoreError::NotFound(id.to_string())),
        }
    }
}
