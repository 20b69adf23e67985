//! Status transition policy.
//!
//! The single place that decides which status edges are legal. Every
//! mutation of a record's status, whether driven by ledger reconciliation
//! or by an operator override, goes through [`apply`], so a finished
//! transaction can never be pulled back into flight by a stale webhook or
//! a racing poller.

use chrono::Utc;
use thiserror::Error;

use super::transaction::{StatusEntry, TransactionRecord, TxStatus};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("illegal status transition: {from} -> {to}")]
    IllegalEdge { from: TxStatus, to: TxStatus },
    #[error("transaction needs a ledger hash before moving to {to}")]
    MissingHash { to: TxStatus },
}

/// Legal status edges. A status may always re-announce itself; terminal
/// statuses accept nothing else. `submitted -> confirmed` covers networks
/// where finality is observed at confirmation depth 1, without an
/// intermediate `confirming` poll.
pub fn is_valid_transition(current: TxStatus, next: TxStatus) -> bool {
    use TxStatus::*;

    if current == next {
        return true;
    }
    match (current, next) {
        (Pending, Submitted) | (Pending, Failed) => true,
        (Submitted, Confirming) | (Submitted, Confirmed) | (Submitted, Failed) => true,
        (Confirming, Confirmed) | (Confirming, Failed) => true,
        // Timeout path: anything still in flight can expire.
        (current, Expired) => !current.is_terminal(),
        _ => false,
    }
}

/// Applies `next` to a copy of `record`, appending exactly one history
/// entry and refreshing `updated_at`. The input record is untouched when
/// the transition is rejected.
///
/// A record may only leave `pending` for a ledger-visible status once it
/// carries a hash; `failed` and `expired` stay reachable so an unsigned,
/// abandoned transaction can still terminate.
pub fn apply(
    record: &TransactionRecord,
    next: TxStatus,
    details: impl Into<String>,
) -> Result<TransactionRecord, TransitionError> {
    if !is_valid_transition(record.status, next) {
        return Err(TransitionError::IllegalEdge {
            from: record.status,
            to: next,
        });
    }

    let needs_hash = record.status == TxStatus::Pending
        && matches!(
            next,
            TxStatus::Submitted | TxStatus::Confirming | TxStatus::Confirmed
        );
    if needs_hash && record.tx_hash.is_none() {
        return Err(TransitionError::MissingHash { to: next });
    }

    let now = Utc::now();
    let mut updated = record.clone();
    updated.status = next;
    updated.updated_at = now;
    updated.status_history.push(StatusEntry {
        status: next,
        timestamp: now,
        details: details.into(),
    });

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::{NewTransaction, TxType};

    const ALL: [TxStatus; 6] = [
        TxStatus::Pending,
        TxStatus::Submitted,
        TxStatus::Confirming,
        TxStatus::Confirmed,
        TxStatus::Failed,
        TxStatus::Expired,
    ];

    fn record_with_status(status: TxStatus) -> TransactionRecord {
        let mut record = TransactionRecord::create(
            TxType::Payment,
            NewTransaction {
                tx_hash: Some("ab".repeat(32)),
                ..Default::default()
            },
        );
        record.status = status;
        record.status_history[0].status = status;
        record
    }

    fn legal_edges() -> Vec<(TxStatus, TxStatus)> {
        use TxStatus::*;
        vec![
            (Pending, Submitted),
            (Pending, Failed),
            (Pending, Expired),
            (Submitted, Confirming),
            (Submitted, Confirmed),
            (Submitted, Failed),
            (Submitted, Expired),
            (Confirming, Confirmed),
            (Confirming, Failed),
            (Confirming, Expired),
        ]
    }

    #[test]
    fn every_legal_edge_applies_and_appends_one_entry() {
        for (from, to) in legal_edges() {
            let record = record_with_status(from);
            let updated = apply(&record, to, "checked").unwrap();
            assert_eq!(updated.status, to, "{} -> {}", from, to);
            assert_eq!(updated.status_history.len(), record.status_history.len() + 1);
            assert_eq!(updated.last_entry().unwrap().status, to);
            assert_eq!(updated.last_entry().unwrap().details, "checked");
            assert!(updated.updated_at >= record.updated_at);
        }
    }

    #[test]
    fn every_other_pair_is_rejected_without_mutation() {
        let legal: Vec<(TxStatus, TxStatus)> = legal_edges();
        for from in ALL {
            for to in ALL {
                if from == to || legal.contains(&(from, to)) {
                    continue;
                }
                let record = record_with_status(from);
                let err = apply(&record, to, "bad").unwrap_err();
                assert_eq!(err, TransitionError::IllegalEdge { from, to });
                assert_eq!(record.status, from);
                assert_eq!(record.status_history.len(), 1);
            }
        }
    }

    #[test]
    fn self_transition_is_legal_and_appends() {
        for status in ALL {
            let record = record_with_status(status);
            let updated = apply(&record, status, "re-checked").unwrap();
            assert_eq!(updated.status, status);
            assert_eq!(updated.status_history.len(), 2);
            assert_eq!(updated.last_entry().unwrap().details, "re-checked");
        }
    }

    #[test]
    fn terminal_states_accept_no_other_status() {
        for from in ALL.iter().filter(|s| s.is_terminal()) {
            for to in ALL.iter().filter(|to| *to != from) {
                assert!(!is_valid_transition(*from, *to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn leaving_pending_for_ledger_status_requires_hash() {
        let mut record = record_with_status(TxStatus::Pending);
        record.tx_hash = None;

        let err = apply(&record, TxStatus::Submitted, "signed").unwrap_err();
        assert_eq!(
            err,
            TransitionError::MissingHash {
                to: TxStatus::Submitted
            }
        );

        // Abandoned unsigned transactions can still fail or expire.
        assert!(apply(&record, TxStatus::Failed, "wallet rejected").is_ok());
        assert!(apply(&record, TxStatus::Expired, "timed out").is_ok());
    }
}
