//! Maps raw ledger observations onto record statuses.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use super::{LedgerClient, LedgerError};
use crate::domain::TxStatus;

/// Condensed ledger view of a single transaction.
#[derive(Debug, Clone)]
pub struct LedgerStatus {
    /// Finalized at or beyond the configured confirmation depth.
    pub confirmed: bool,
    /// `None` while the transaction sits in the network's queue.
    pub successful: Option<bool>,
    pub confirmations: i64,
    pub closed_at: Option<DateTime<Utc>>,
    pub result_code: Option<String>,
}

/// Queries the ledger and decides what status a record should move to.
///
/// `pending_expiry` is the business timeout: a hash the network has never
/// seen past this window counts as expired. It is minutes, not the
/// seconds-scale request timeout the client enforces per call.
#[derive(Clone)]
pub struct Reconciler {
    client: Arc<dyn LedgerClient>,
    confirmation_depth: i64,
    pending_expiry: Duration,
}

impl Reconciler {
    pub fn new(client: Arc<dyn LedgerClient>, confirmation_depth: i64, pending_expiry: Duration) -> Self {
        Self {
            client,
            confirmation_depth: confirmation_depth.max(1),
            pending_expiry,
        }
    }

    pub fn pending_expiry(&self) -> Duration {
        self.pending_expiry
    }

    /// Raw ledger status for a hash. Network errors surface unchanged so
    /// the caller's cron can retry; nothing is written here.
    pub async fn check_status(&self, tx_hash: &str) -> Result<LedgerStatus, LedgerError> {
        let tx = self.client.transaction_by_hash(tx_hash).await?;

        let confirmations = match (tx.successful, tx.ledger) {
            (Some(_), Some(sequence)) => {
                let tip = self.client.latest_ledger().await?;
                (tip - sequence + 1).max(0)
            }
            _ => 0,
        };

        Ok(LedgerStatus {
            confirmed: tx.successful == Some(true) && confirmations >= self.confirmation_depth,
            successful: tx.successful,
            confirmations,
            closed_at: tx.created_at,
            result_code: tx.result_code,
        })
    }

    /// Target status for a record's hash, with the history details to
    /// record alongside it.
    pub async fn resolve(
        &self,
        tx_hash: &str,
        record_created_at: DateTime<Utc>,
    ) -> Result<(TxStatus, String), LedgerError> {
        match self.check_status(tx_hash).await {
            Ok(status) => Ok(Self::target_for(&status, self.confirmation_depth)),
            Err(LedgerError::NotFound(_)) => {
                let age = Utc::now() - record_created_at;
                if age > self.pending_expiry {
                    Ok((
                        TxStatus::Expired,
                        format!(
                            "not seen by the ledger within {}s",
                            self.pending_expiry.num_seconds()
                        ),
                    ))
                } else {
                    Ok((TxStatus::Submitted, "awaiting ledger inclusion".to_string()))
                }
            }
            Err(err) => Err(err),
        }
    }

    fn target_for(status: &LedgerStatus, depth: i64) -> (TxStatus, String) {
        match status.successful {
            Some(false) => {
                let code = status.result_code.as_deref().unwrap_or("unknown");
                (TxStatus::Failed, format!("ledger rejected transaction: {}", code))
            }
            Some(true) if status.confirmed => {
                let closed = status
                    .closed_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "unknown close time".to_string());
                (TxStatus::Confirmed, format!("ledger confirmed, closed at {}", closed))
            }
            Some(true) => (
                TxStatus::Confirming,
                format!("{}/{} confirmations", status.confirmations, depth),
            ),
            None => (TxStatus::Confirming, "queued by ledger".to_string()),
        }
    }
}
