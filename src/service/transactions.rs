//! Transaction lifecycle orchestration.
//!
//! The only component callers interact with. Every status mutation is a
//! read-modify-write under a per-record async lock, with the store's
//! conditional `replace` as the cross-process backstop: two callers racing
//! on the same transaction commit exactly one transition each round.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{policy, NewTransaction, TransactionRecord, TxStatus, TxType};
use crate::error::AppError;
use crate::ledger::Reconciler;
use crate::store::{Page, StoreError, TransactionFilter, TransactionStore};
use crate::validation;

/// Extra fields an override caller may attach before the transition is
/// applied: the ledger hash once the wallet signs, the originating domain
/// object, and metadata to merge.
#[derive(Debug, Clone, Default)]
pub struct StatusOverride {
    pub tx_hash: Option<String>,
    pub wallet_address: Option<String>,
    pub source_id: Option<String>,
    pub source_type: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

pub struct TransactionService {
    store: Arc<dyn TransactionStore>,
    reconciler: Reconciler,
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl TransactionService {
    pub fn new(store: Arc<dyn TransactionStore>, reconciler: Reconciler) -> Self {
        Self {
            store,
            reconciler,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn TransactionStore> {
        &self.store
    }

    pub(crate) fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Registers a new transaction as `pending`. The hash may be absent
    /// for donations initiated before the wallet signs.
    pub async fn create(
        &self,
        tx_type: Option<TxType>,
        input: NewTransaction,
    ) -> Result<TransactionRecord, AppError> {
        let tx_type = tx_type.ok_or_else(|| AppError::Validation("type is required".to_string()))?;

        if let Some(hash) = &input.tx_hash {
            validation::validate_tx_hash(hash)?;
        }
        if let Some(address) = &input.wallet_address {
            validation::validate_wallet_address(address)?;
        }
        if let Some(amount) = &input.amount {
            validation::validate_positive_amount(&amount.value)?;
            validation::validate_currency_code(&amount.currency)?;
        }

        let record = TransactionRecord::create(tx_type, input);
        let saved = self.store.insert(&record).await?;
        tracing::info!(id = %saved.id, tx_type = %saved.tx_type, "transaction registered");
        Ok(saved)
    }

    /// Looks a record up by ledger hash, falling back to the record id.
    pub async fn get(&self, key: &str) -> Result<TransactionRecord, AppError> {
        if let Some(record) = self.store.find_by_hash(key).await? {
            return Ok(record);
        }
        if let Ok(id) = key.parse::<Uuid>() {
            if let Some(record) = self.store.find_by_id(id).await? {
                return Ok(record);
            }
        }
        Err(AppError::NotFound(format!("transaction {}", key)))
    }

    /// Reconciles a record against the ledger and persists the outcome.
    ///
    /// Terminal records and no-change polls only refresh `last_checked`; a
    /// history entry is appended on a same-status poll only when the
    /// ledger's details changed, so recurring cron sweeps cannot grow the
    /// history without bound.
    pub async fn check_transaction_status(
        &self,
        tx_hash: &str,
    ) -> Result<TransactionRecord, AppError> {
        let record = self
            .store
            .find_by_hash(tx_hash)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("transaction {}", tx_hash)))?;

        let lock = self.lock_for(record.id);
        let _guard = lock.lock().await;

        let mut attempts = 0;
        loop {
            attempts += 1;
            let current = self
                .store
                .find_by_hash(tx_hash)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("transaction {}", tx_hash)))?;
            let expected = current.updated_at;
            let now = Utc::now();

            let next = if current.status.is_terminal() {
                let mut touched = current.clone();
                touched.last_checked = Some(now);
                touched
            } else {
                let (target, details) =
                    self.reconciler.resolve(tx_hash, current.created_at).await?;
                let mut updated = if target == current.status {
                    let same_details =
                        current.last_entry().map(|e| e.details.as_str()) == Some(details.as_str());
                    if same_details {
                        current.clone()
                    } else {
                        policy::apply(&current, target, details)?
                    }
                } else if current.status == TxStatus::Pending
                    && matches!(target, TxStatus::Confirming | TxStatus::Confirmed)
                {
                    // The ledger can outrun our polling; commit the
                    // intermediate edge so only table transitions land.
                    let submitted = policy::apply(&current, TxStatus::Submitted, "seen on ledger")?;
                    policy::apply(&submitted, target, details)?
                } else {
                    policy::apply(&current, target, details)?
                };
                updated.last_checked = Some(now);
                updated
            };

            match self.store.replace(current.id, &next, expected).await {
                Ok(saved) => {
                    if saved.status != current.status {
                        tracing::info!(
                            id = %saved.id,
                            from = %current.status,
                            to = %saved.status,
                            "transaction reconciled"
                        );
                    }
                    self.prune_lock(&saved);
                    return Ok(saved);
                }
                Err(StoreError::Conflict) if attempts < 2 => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Forces a status, on behalf of an operator or a signed webhook. The
    /// transition still goes through the policy, so a terminal record
    /// cannot be resurrected. Self-transitions append the new details.
    pub async fn update_transaction_status(
        &self,
        key: &str,
        status: TxStatus,
        details: Option<String>,
        extra: StatusOverride,
    ) -> Result<TransactionRecord, AppError> {
        let record = self.get(key).await?;

        let lock = self.lock_for(record.id);
        let _guard = lock.lock().await;

        let details = details.unwrap_or_else(|| "status updated".to_string());

        let mut attempts = 0;
        loop {
            attempts += 1;
            let current = self
                .store
                .find_by_id(record.id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("transaction {}", key)))?;
            let expected = current.updated_at;

            let staged = apply_override(&current, &extra)?;
            let updated = policy::apply(&staged, status, details.clone())?;

            match self.store.replace(current.id, &updated, expected).await {
                Ok(saved) => {
                    tracing::info!(
                        id = %saved.id,
                        from = %current.status,
                        to = %saved.status,
                        "transaction status updated"
                    );
                    self.prune_lock(&saved);
                    return Ok(saved);
                }
                Err(StoreError::Conflict) if attempts < 2 => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub async fn list(
        &self,
        filter: TransactionFilter,
        page: Page,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        Ok(self.store.list(&filter, page).await?)
    }

    pub async fn transactions_by_status(
        &self,
        status: TxStatus,
        page: Page,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        self.list(
            TransactionFilter {
                status: Some(status),
                ..Default::default()
            },
            page,
        )
        .await
    }

    pub async fn campaign_transactions(
        &self,
        campaign_id: &str,
        page: Page,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        self.list(
            TransactionFilter {
                source_type: Some("campaign".to_string()),
                source_id: Some(campaign_id.to_string()),
                ..Default::default()
            },
            page,
        )
        .await
    }

    pub async fn user_transactions(
        &self,
        user_id: &str,
        page: Page,
    ) -> Result<Vec<TransactionRecord>, AppError> {
        self.list(
            TransactionFilter {
                user_id: Some(user_id.to_string()),
                ..Default::default()
            },
            page,
        )
        .await
    }

    fn lock_for(&self, id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Terminal records take no further transitions; their lock entry can go.
    fn prune_lock(&self, record: &TransactionRecord) {
        if record.status.is_terminal() {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.remove(&record.id);
        }
    }
}

fn apply_override(
    record: &TransactionRecord,
    extra: &StatusOverride,
) -> Result<TransactionRecord, AppError> {
    let mut staged = record.clone();

    if let Some(hash) = &extra.tx_hash {
        validation::validate_tx_hash(hash)?;
        match &staged.tx_hash {
            Some(existing) if existing != hash => {
                return Err(AppError::Validation(format!(
                    "transaction already has ledger hash {}",
                    existing
                )));
            }
            _ => staged.tx_hash = Some(hash.clone()),
        }
    }
    if let Some(address) = &extra.wallet_address {
        validation::validate_wallet_address(address)?;
        staged.wallet_address = Some(address.clone());
    }
    if let Some(source_id) = &extra.source_id {
        staged.source_id = Some(source_id.clone());
    }
    if let Some(source_type) = &extra.source_type {
        staged.source_type = Some(source_type.clone());
    }
    if let Some(patch) = &extra.metadata {
        staged.metadata = Some(merge_metadata(staged.metadata.take(), patch));
    }

    Ok(staged)
}

fn merge_metadata(
    existing: Option<serde_json::Value>,
    patch: &serde_json::Value,
) -> serde_json::Value {
    match (existing, patch) {
        (Some(serde_json::Value::Object(mut base)), serde_json::Value::Object(additions)) => {
            for (key, value) in additions {
                base.insert(key.clone(), value.clone());
            }
            serde_json::Value::Object(base)
        }
        (_, patch) => patch.clone(),
    }
}
