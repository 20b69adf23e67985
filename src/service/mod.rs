pub mod poller;
pub mod transactions;

pub use poller::SweepReport;
pub use transactions::{StatusOverride, TransactionService};
