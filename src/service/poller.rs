//! Recurring reconciliation sweep.
//!
//! The cron body that keeps in-flight transactions moving: every
//! non-terminal record is either re-checked against the ledger or, when it
//! never acquired a hash inside the expiry window, expired outright.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use super::transactions::{StatusOverride, TransactionService};
use crate::domain::{TransactionRecord, TxStatus};
use crate::error::AppError;
use crate::store::{Page, TransactionFilter, MAX_PAGE_LIMIT};

const IN_FLIGHT: [TxStatus; 3] = [TxStatus::Pending, TxStatus::Submitted, TxStatus::Confirming];

// Bounds one sweep; anything beyond is picked up by the next run.
const MAX_SWEEP_PAGES: i64 = 50;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub transitioned: usize,
    pub expired: usize,
    pub errors: usize,
}

impl TransactionService {
    /// One reconciliation pass over every in-flight record. Per-record
    /// failures are logged and counted; they never abort the sweep.
    pub async fn reconcile_sweep(&self) -> Result<SweepReport, AppError> {
        let mut report = SweepReport::default();

        let mut batch: Vec<TransactionRecord> = Vec::new();
        for status in IN_FLIGHT {
            let filter = TransactionFilter {
                status: Some(status),
                ..Default::default()
            };
            for page in 1..=MAX_SWEEP_PAGES {
                let records = self
                    .store()
                    .list(
                        &filter,
                        Page {
                            page,
                            limit: MAX_PAGE_LIMIT,
                        },
                    )
                    .await?;
                let full_page = records.len() as i64 == MAX_PAGE_LIMIT;
                batch.extend(records);
                if !full_page {
                    break;
                }
            }
        }

        for record in batch {
            report.examined += 1;

            match &record.tx_hash {
                Some(tx_hash) => match self.check_transaction_status(tx_hash).await {
                    Ok(updated) => {
                        if updated.status != record.status {
                            report.transitioned += 1;
                            if updated.status == TxStatus::Expired {
                                report.expired += 1;
                            }
                        }
                    }
                    Err(err) => {
                        report.errors += 1;
                        tracing::warn!(id = %record.id, error = %err, "reconciliation failed");
                    }
                },
                None => {
                    let age = Utc::now() - record.created_at;
                    if age > self.reconciler().pending_expiry() {
                        let expired = self
                            .update_transaction_status(
                                &record.id.to_string(),
                                TxStatus::Expired,
                                Some("no ledger hash within the expiry window".to_string()),
                                StatusOverride::default(),
                            )
                            .await;
                        match expired {
                            Ok(_) => {
                                report.transitioned += 1;
                                report.expired += 1;
                            }
                            Err(err) => {
                                report.errors += 1;
                                tracing::warn!(id = %record.id, error = %err, "expiry failed");
                            }
                        }
                    }
                }
            }
        }

        Ok(report)
    }
}

/// Drives `reconcile_sweep` on a fixed interval until the process stops.
pub async fn run_reconciler(service: Arc<TransactionService>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match service.reconcile_sweep().await {
            Ok(report) => tracing::info!(
                examined = report.examined,
                transitioned = report.transitioned,
                expired = report.expired,
                errors = report.errors,
                "reconciliation sweep finished"
            ),
            Err(err) => tracing::error!(error = %err, "reconciliation sweep aborted"),
        }
    }
}
