//! End-to-end lifecycle scenarios driven through the service.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use lumenflow::domain::{Amount, NewTransaction, TransactionRecord, TxStatus, TxType};
use lumenflow::error::AppError;
use lumenflow::ledger::{LedgerClient, LedgerError, LedgerTransaction, Reconciler};
use lumenflow::service::{StatusOverride, TransactionService};
use lumenflow::store::{InMemoryTransactionStore, TransactionStore};

#[derive(Clone)]
enum LedgerReply {
    NotSeen,
    Success { ledger: i64 },
}

struct ScriptedLedger {
    reply: Mutex<LedgerReply>,
    tip: i64,
}

impl ScriptedLedger {
    fn new(reply: LedgerReply) -> Arc<Self> {
        Arc::new(Self {
            reply: Mutex::new(reply),
            tip: 500,
        })
    }

    fn set(&self, reply: LedgerReply) {
        *self.reply.lock().unwrap() = reply;
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    async fn transaction_by_hash(&self, tx_hash: &str) -> Result<LedgerTransaction, LedgerError> {
        match self.reply.lock().unwrap().clone() {
            LedgerReply::NotSeen => Err(LedgerError::NotFound(tx_hash.to_string())),
            LedgerReply::Success { ledger } => Ok(LedgerTransaction {
                hash: tx_hash.to_string(),
                successful: Some(true),
                ledger: Some(ledger),
                created_at: Some(Utc::now()),
                result_code: None,
            }),
        }
    }

    async fn latest_ledger(&self) -> Result<i64, LedgerError> {
        Ok(self.tip)
    }
}

fn setup(
    reply: LedgerReply,
    expiry_secs: i64,
) -> (
    Arc<TransactionService>,
    Arc<InMemoryTransactionStore>,
    Arc<ScriptedLedger>,
) {
    let store = Arc::new(InMemoryTransactionStore::new());
    let ledger = ScriptedLedger::new(reply);
    let reconciler = Reconciler::new(ledger.clone(), 1, chrono::Duration::seconds(expiry_secs));
    let service = Arc::new(TransactionService::new(store.clone(), reconciler));
    (service, store, ledger)
}

fn donation_hash() -> String {
    "4e".repeat(32)
}

#[tokio::test]
async fn donation_lifecycle_from_unsigned_to_confirmed() {
    let (service, _store, ledger) = setup(LedgerReply::NotSeen, 300);

    // A donation is registered before the wallet signs anything.
    let created = service
        .create(
            Some(TxType::Donation),
            NewTransaction {
                amount: Some(Amount {
                    value: BigDecimal::from_str("120.00").unwrap(),
                    currency: "XLM".to_string(),
                }),
                source_type: Some("campaign".to_string()),
                source_id: Some("camp-42".to_string()),
                metadata: Some(serde_json::json!({"user_id": "donor-7"})),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(created.status, TxStatus::Pending);
    assert_eq!(created.status_history.len(), 1);

    // Round trip by id while no hash exists.
    let fetched = service.get(&created.id.to_string()).await.unwrap();
    assert_eq!(fetched.id, created.id);

    // The wallet signs: the callback attaches the hash and submits.
    let submitted = service
        .update_transaction_status(
            &created.id.to_string(),
            TxStatus::Submitted,
            Some("envelope signed and submitted".to_string()),
            StatusOverride {
                tx_hash: Some(donation_hash()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(submitted.status, TxStatus::Submitted);
    assert_eq!(submitted.status_history.len(), 2);

    // The ledger confirms; the next reconciliation lands the terminal state.
    ledger.set(LedgerReply::Success { ledger: 500 });
    let confirmed = service
        .check_transaction_status(&donation_hash())
        .await
        .unwrap();
    assert_eq!(confirmed.status, TxStatus::Confirmed);
    assert_eq!(confirmed.status_history.len(), 3);

    // A later poll leaves everything but last_checked untouched.
    let rechecked = service
        .check_transaction_status(&donation_hash())
        .await
        .unwrap();
    assert_eq!(rechecked.status, TxStatus::Confirmed);
    assert_eq!(rechecked.status_history.len(), 3);
    assert_eq!(rechecked.updated_at, confirmed.updated_at);
    assert!(rechecked.last_checked >= confirmed.last_checked);

    // And no override can resurrect it.
    let resurrect = service
        .update_transaction_status(
            &donation_hash(),
            TxStatus::Pending,
            None,
            StatusOverride::default(),
        )
        .await;
    assert!(matches!(resurrect, Err(AppError::InvalidTransition(_))));
}

#[tokio::test]
async fn unseen_transaction_expires_after_the_window() {
    let (service, store, _ledger) = setup(LedgerReply::NotSeen, 300);

    // Submitted long ago, never picked up by the network.
    let mut record = TransactionRecord::create(
        TxType::Payment,
        NewTransaction {
            tx_hash: Some(donation_hash()),
            ..Default::default()
        },
    );
    record.created_at = Utc::now() - chrono::Duration::seconds(900);
    store.insert(&record).await.unwrap();

    let expired = service
        .check_transaction_status(&donation_hash())
        .await
        .unwrap();
    assert_eq!(expired.status, TxStatus::Expired);
    assert_eq!(expired.status_history.len(), 2);

    // Further checks are no-ops.
    let rechecked = service
        .check_transaction_status(&donation_hash())
        .await
        .unwrap();
    assert_eq!(rechecked.status, TxStatus::Expired);
    assert_eq!(rechecked.status_history.len(), 2);
}

#[tokio::test]
async fn young_unseen_transaction_stays_submitted() {
    let (service, _store, _ledger) = setup(LedgerReply::NotSeen, 300);

    service
        .create(
            Some(TxType::Donation),
            NewTransaction {
                tx_hash: Some(donation_hash()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let checked = service
        .check_transaction_status(&donation_hash())
        .await
        .unwrap();
    assert_eq!(checked.status, TxStatus::Submitted);

    let rechecked = service
        .check_transaction_status(&donation_hash())
        .await
        .unwrap();
    assert_eq!(rechecked.status, TxStatus::Submitted);
    assert_eq!(rechecked.status_history.len(), checked.status_history.len());
}

#[tokio::test]
async fn listings_cover_status_campaign_and_user() {
    let (service, _store, _ledger) = setup(LedgerReply::NotSeen, 300);

    service
        .create(
            Some(TxType::Donation),
            NewTransaction {
                source_type: Some("campaign".to_string()),
                source_id: Some("camp-1".to_string()),
                metadata: Some(serde_json::json!({"user_id": "donor-a"})),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    service
        .create(
            Some(TxType::Payment),
            NewTransaction {
                source_type: Some("campaign".to_string()),
                source_id: Some("camp-2".to_string()),
                metadata: Some(serde_json::json!({"user_id": "donor-b"})),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let pending = service
        .transactions_by_status(TxStatus::Pending, Default::default())
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);

    let camp1 = service
        .campaign_transactions("camp-1", Default::default())
        .await
        .unwrap();
    assert_eq!(camp1.len(), 1);
    assert_eq!(camp1[0].source_id.as_deref(), Some("camp-1"));

    let donor_b = service
        .user_transactions("donor-b", Default::default())
        .await
        .unwrap();
    assert_eq!(donor_b.len(), 1);
    assert_eq!(donor_b[0].tx_type, TxType::Payment);

    let confirmed = service
        .transactions_by_status(TxStatus::Confirmed, Default::default())
        .await
        .unwrap();
    assert!(confirmed.is_empty());
}
