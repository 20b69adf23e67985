//! Ledger access: the external network of record that independently
//! confirms or rejects transactions.

pub mod horizon;
pub mod reconciler;

pub use horizon::HorizonClient;
pub use reconciler::{LedgerStatus, Reconciler};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("transaction not found on ledger: {0}")]
    NotFound(String),
    #[error("ledger request timed out")]
    Timeout,
    #[error("ledger request failed: {0}")]
    Network(String),
    #[error("invalid response from ledger: {0}")]
    InvalidResponse(String),
    #[error("ledger circuit breaker is open")]
    CircuitOpen,
}

/// Raw transaction view returned by the ledger HTTP API. `successful` is
/// absent while the transaction sits in the network's queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub hash: String,
    #[serde(default)]
    pub successful: Option<bool>,
    #[serde(default)]
    pub ledger: Option<i64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result_code: Option<String>,
}

/// Narrow interface over the ledger's HTTP API. Implemented by
/// [`HorizonClient`]; tests substitute programmable stubs.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn transaction_by_hash(&self, tx_hash: &str) -> Result<LedgerTransaction, LedgerError>;

    /// Sequence number of the most recently closed ledger.
    async fn latest_ledger(&self) -> Result<i64, LedgerError>;
}
