//! Types module
//!
//! Contains core data structures used throughout the ledger.
//! This module organizes types into logical submodules:
//! - `wallet`: Wallet-related types
//! - `transaction`: Transaction-related types and identifiers
//! - `actor`: Caller identity and roles
//! - `command`: Commands replayed from a script
//! - `filter`: Transaction selection shared by reads
//! - `error`: Error types for the ledger

pub mod actor;
pub mod command;
pub mod error;
pub mod filter;
pub mod transaction;
pub mod wallet;

pub use actor::{Actor, Role};
pub use command::{LedgerCommand, LIST_SEPARATOR};
pub use error::{ErrorKind, LedgerError};
pub use filter::{DateRange, Page, TransactionFilter};
pub use transaction::{
    CourseId, CourseTransaction, CourseTransactionId, CourseTransactionStatus, TransactionId,
    TransactionStatus, TransactionType, WalletTransaction,
};
pub use wallet::{BalanceMismatch, OwnerId, Wallet, WalletId};
