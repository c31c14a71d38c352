//! Credit Wallet Ledger Library
//! # Overview
//!
//! This library keeps a credit wallet per user and the ledger of every
//! credit movement, with a sync and an async strategy for replaying command
//! scripts into it.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Wallet, WalletTransaction, Actor, filters, errors)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::wallet_store`] - Wallet and transaction storage with atomic commits
//!   - [`core::workflow`] - Credit purchase requests and their review
//!   - [`core::adjustment`] - Administrative balance corrections
//!   - [`core::bulk`] - All-or-nothing bulk approval and rejection
//!   - [`core::course_purchase`] - Course purchases paid with credits, and refunds
//!   - [`core::statistics`] / [`core::export`] - Reporting
//!   - [`core::ledger`] - Role-checked entry point for all operations
//! - [`io`] - Script readers and report writers
//! - [`strategy`] - Sync and async replay of command scripts
//!
//! # Transaction Types
//!
//! - **CreditPurchase**: A request for credits; PENDING until an administrator
//!   approves (credits the wallet) or rejects it, or the owner cancels it
//! - **CoursePurchase**: Credits spent on a course (negative amount)
//! - **Refund**: Credits returned for a refunded course purchase
//! - **CreditAdjustment**: A signed correction by an administrator
//!
//! # Wallet Invariants
//!
//! Each wallet balance:
//! - equals the sum of the wallet's COMPLETED transaction amounts
//! - never becomes negative

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use core::{Ledger, LedgerConfig, WalletStore};
pub use io::write_wallets_csv;
pub use types::{
    Actor, LedgerError, OwnerId, TransactionId, TransactionStatus, TransactionType, Wallet,
    WalletTransaction,
};
