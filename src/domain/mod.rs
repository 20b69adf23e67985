pub mod policy;
pub mod transaction;

pub use transaction::{Amount, NewTransaction, StatusEntry, TransactionRecord, TxStatus, TxType};
