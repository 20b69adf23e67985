//! Transaction domain entity.
//! Framework-agnostic representation of a tracked ledger transaction.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// What kind of on-ledger operation a record tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxType {
    Payment,
    AccountCreation,
    EscrowSetup,
    MilestoneRelease,
    Donation,
    Other,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Payment => "payment",
            TxType::AccountCreation => "account_creation",
            TxType::EscrowSetup => "escrow_setup",
            TxType::MilestoneRelease => "milestone_release",
            TxType::Donation => "donation",
            TxType::Other => "other",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment" => Ok(TxType::Payment),
            "account_creation" => Ok(TxType::AccountCreation),
            "escrow_setup" => Ok(TxType::EscrowSetup),
            "milestone_release" => Ok(TxType::MilestoneRelease),
            "donation" => Ok(TxType::Donation),
            "other" => Ok(TxType::Other),
            other => Err(format!("unknown transaction type: {}", other)),
        }
    }
}

/// Lifecycle status of a tracked transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Submitted,
    Confirming,
    Confirmed,
    Failed,
    Expired,
}

impl TxStatus {
    /// Terminal statuses never transition to a different status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed | TxStatus::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TxStatus::Pending => "pending",
            TxStatus::Submitted => "submitted",
            TxStatus::Confirming => "confirming",
            TxStatus::Confirmed => "confirmed",
            TxStatus::Failed => "failed",
            TxStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TxStatus::Pending),
            "submitted" => Ok(TxStatus::Submitted),
            "confirming" => Ok(TxStatus::Confirming),
            "confirmed" => Ok(TxStatus::Confirmed),
            "failed" => Ok(TxStatus::Failed),
            "expired" => Ok(TxStatus::Expired),
            other => Err(format!("unknown transaction status: {}", other)),
        }
    }
}

/// Monetary value of a tracked transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub value: BigDecimal,
    pub currency: String,
}

/// One entry in the append-only status audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: TxStatus,
    pub timestamp: DateTime<Utc>,
    pub details: String,
}

/// Inputs accepted when creating a record. Everything beyond the type is
/// optional: a donation can be registered before the wallet signs.
#[derive(Debug, Clone, Default)]
pub struct NewTransaction {
    pub tx_hash: Option<String>,
    pub amount: Option<Amount>,
    pub wallet_address: Option<String>,
    pub source_id: Option<String>,
    pub source_type: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// A tracked ledger transaction with its full status history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub tx_hash: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    pub status: TxStatus,
    pub amount: Option<Amount>,
    pub wallet_address: Option<String>,
    pub source_id: Option<String>,
    pub source_type: Option<String>,
    pub status_history: Vec<StatusEntry>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_checked: Option<DateTime<Utc>>,
}

impl TransactionRecord {
    /// Builds a fresh `pending` record with a single "created" history entry.
    pub fn create(tx_type: TxType, input: NewTransaction) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tx_hash: input.tx_hash,
            tx_type,
            status: TxStatus::Pending,
            amount: input.amount,
            wallet_address: input.wallet_address,
            source_id: input.source_id,
            source_type: input.source_type,
            status_history: vec![StatusEntry {
                status: TxStatus::Pending,
                timestamp: now,
                details: "created".to_string(),
            }],
            metadata: input.metadata,
            created_at: now,
            updated_at: now,
            last_checked: None,
        }
    }

    /// Most recent history entry. The history is never empty.
    pub fn last_entry(&self) -> Option<&StatusEntry> {
        self.status_history.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_starts_pending_with_one_history_entry() {
        let record = TransactionRecord::create(
            TxType::Donation,
            NewTransaction {
                metadata: Some(serde_json::json!({"user_id": "donor-1"})),
                ..Default::default()
            },
        );

        assert_eq!(record.status, TxStatus::Pending);
        assert_eq!(record.status_history.len(), 1);
        assert_eq!(record.status_history[0].status, TxStatus::Pending);
        assert_eq!(record.status_history[0].details, "created");
        assert!(record.tx_hash.is_none());
        assert!(record.last_checked.is_none());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            TxStatus::Pending,
            TxStatus::Submitted,
            TxStatus::Confirming,
            TxStatus::Confirmed,
            TxStatus::Failed,
            TxStatus::Expired,
        ] {
            assert_eq!(status.as_str().parse::<TxStatus>().unwrap(), status);
        }
        assert!("finalized".parse::<TxStatus>().is_err());
    }

    #[test]
    fn type_round_trips_through_strings() {
        assert_eq!("donation".parse::<TxType>().unwrap(), TxType::Donation);
        assert_eq!(
            "milestone_release".parse::<TxType>().unwrap(),
            TxType::MilestoneRelease
        );
        assert!("refund".parse::<TxType>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(TxStatus::Confirmed.is_terminal());
        assert!(TxStatus::Failed.is_terminal());
        assert!(TxStatus::Expired.is_terminal());
        assert!(!TxStatus::Pending.is_terminal());
        assert!(!TxStatus::Submitted.is_terminal());
        assert!(!TxStatus::Confirming.is_terminal());
    }

    #[test]
    fn record_serializes_type_field() {
        let record = TransactionRecord::create(TxType::Payment, NewTransaction::default());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "payment");
        assert_eq!(json["status"], "pending");
    }
}
