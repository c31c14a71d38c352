//! Core business logic module
//!
//! This module contains the ledger components:
//! - `wallet_store` - Storage and the atomic commit of units of work
//! - `unit_of_work` - Staged writes handed to the store
//! - `workflow` - Credit purchase request, approval, rejection, cancellation
//! - `adjustment` - Signed administrative corrections
//! - `bulk` - Batch approval and rejection
//! - `course_purchase` - Course purchases and refunds
//! - `statistics` - Aggregates over completed transactions
//! - `export` - Flat rows for reporting
//! - `traits` / `directory` - Display names and course titles
//! - `ledger` - Role-checked façade over all of the above

pub mod adjustment;
pub mod bulk;
pub mod course_purchase;
pub mod directory;
pub mod export;
pub mod ledger;
pub mod statistics;
pub mod traits;
pub mod unit_of_work;
pub mod wallet_store;
pub mod workflow;

pub use adjustment::AdjustmentEngine;
pub use bulk::{BulkOutcome, BulkProcessor, WalletBatchTotal};
pub use course_purchase::{CoursePurchase, CoursePurchaseRecorder};
pub use directory::InMemoryDirectory;
pub use export::{ExportRow, ExportService};
pub use ledger::{Ledger, LedgerConfig, DEFAULT_TOP_WALLETS};
pub use statistics::{LedgerStatistics, StatisticsAggregator, TypeTotals, WalletActivity};
pub use traits::{Directory, UserProfile};
pub use unit_of_work::{Settlement, UnitOfWork, WriteOp};
pub use wallet_store::{CommitReceipt, LedgerSnapshot, WalletStore};
pub use workflow::WorkflowEngine;
