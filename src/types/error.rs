//! Error types for the credit ledger
//!
//! This module defines every failure a ledger operation can report. All of
//! them are raised before any write is applied, so an error always means the
//! ledger is exactly as it was before the call.
//!
//! # Error Categories
//!
//! - **Not found**: unknown wallet, transaction, or an empty bulk selection
//! - **Invalid state**: the target transaction is no longer PENDING
//! - **Insufficient balance**: a debit would drive a wallet negative
//! - **Validation**: non-positive amounts, blank reasons, bad filters
//! - **Authorization**: anonymous or under-privileged actors
//! - **File I/O / CSV parsing**: raised by the command-line replay tool only

use rust_decimal::Decimal;
use thiserror::Error;

use super::transaction::{CourseTransactionId, TransactionId, TransactionStatus};
use super::wallet::{OwnerId, WalletId};

/// Coarse classification of a [`LedgerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    InsufficientBalance,
    Validation,
    Unauthorized,
    Forbidden,
    Arithmetic,
    Io,
    Parse,
}

/// Main error type for the credit ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// No wallet exists for the owner
    #[error("Wallet not found for owner {owner}")]
    WalletNotFound { owner: OwnerId },

    /// A unit of work referenced a wallet id the store does not hold
    #[error("Wallet {wallet} not found")]
    WalletIdNotFound { wallet: WalletId },

    /// The referenced wallet transaction does not exist (or is not visible
    /// to the caller)
    #[error("Transaction {tx} not found for {operation}")]
    TransactionNotFound {
        tx: TransactionId,
        operation: String,
    },

    /// The referenced course transaction does not exist
    #[error("Course transaction {id} not found for {operation}")]
    CourseTransactionNotFound {
        id: CourseTransactionId,
        operation: String,
    },

    /// A bulk call in which no id referenced a PENDING credit purchase
    #[error("No pending credit purchases among {requested} ids for {operation}")]
    NoEligibleTransactions { requested: usize, operation: String },

    /// The target transaction is not in a state the operation accepts
    ///
    /// Replaying an approval against an already COMPLETED transaction ends
    /// here, so it can never credit twice.
    #[error("Transaction {tx} is {status}, cannot {operation}")]
    InvalidState {
        tx: TransactionId,
        status: TransactionStatus,
        operation: String,
    },

    /// The course purchase has already been refunded
    #[error("Course transaction {id} is already refunded")]
    AlreadyRefunded { id: CourseTransactionId },

    /// A debit would leave the wallet with a negative balance
    #[error(
        "Insufficient balance for owner {owner}: balance {balance}, change {requested}"
    )]
    InsufficientBalance {
        owner: OwnerId,
        balance: Decimal,
        requested: Decimal,
    },

    /// Amount rejected at the boundary
    #[error("Invalid amount {amount}: {reason}")]
    InvalidAmount { amount: Decimal, reason: String },

    /// Any other input rejected at the boundary
    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    /// No authenticated actor
    #[error("Authentication required for {operation}")]
    Unauthorized { operation: String },

    /// Authenticated actor without the role the operation requires
    #[error("Actor {actor} is not allowed to {operation}")]
    Forbidden { actor: OwnerId, operation: String },

    /// Decimal arithmetic would overflow
    #[error("Arithmetic overflow in {operation} for wallet {wallet}")]
    ArithmeticOverflow { operation: String, wallet: WalletId },

    /// File not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// I/O error while reading a script or writing a report
    #[error("I/O error: {message}")]
    IoError { message: String },

    /// Malformed CSV or JSON
    #[error("Parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError { line: Option<u64>, message: String },
}

impl From<std::io::Error> for LedgerError {
    fn from(error: std::io::Error) -> Self {
        LedgerError::IoError {
            message: error.to_string(),
        }
    }
}

impl From<csv::Error> for LedgerError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        LedgerError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(error: serde_json::Error) -> Self {
        LedgerError::ParseError {
            line: Some(error.line() as u64),
            message: error.to_string(),
        }
    }
}

impl LedgerError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::WalletNotFound { .. }
            | LedgerError::WalletIdNotFound { .. }
            | LedgerError::TransactionNotFound { .. }
            | LedgerError::CourseTransactionNotFound { .. }
            | LedgerError::NoEligibleTransactions { .. } => ErrorKind::NotFound,
            LedgerError::InvalidState { .. } | LedgerError::AlreadyRefunded { .. } => {
                ErrorKind::InvalidState
            }
            LedgerError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            LedgerError::InvalidAmount { .. } | LedgerError::InvalidInput { .. } => {
                ErrorKind::Validation
            }
            LedgerError::Unauthorized { .. } => ErrorKind::Unauthorized,
            LedgerError::Forbidden { .. } => ErrorKind::Forbidden,
            LedgerError::ArithmeticOverflow { .. } => ErrorKind::Arithmetic,
            LedgerError::FileNotFound { .. } | LedgerError::IoError { .. } => ErrorKind::Io,
            LedgerError::ParseError { .. } => ErrorKind::Parse,
        }
    }

    /// Whether the failed call left the ledger untouched
    ///
    /// Every ledger operation validates before it writes, so only I/O
    /// failures of the replay tool (which may have written part of a report)
    /// report `false`.
    pub fn is_retry_safe(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Io)
    }

    /// Create a WalletNotFound error
    pub fn wallet_not_found(owner: OwnerId) -> Self {
        LedgerError::WalletNotFound { owner }
    }

    /// Create a WalletIdNotFound error
    pub fn wallet_id_not_found(wallet: WalletId) -> Self {
        LedgerError::WalletIdNotFound { wallet }
    }

    /// Create a TransactionNotFound error
    pub fn transaction_not_found(tx: TransactionId, operation: &str) -> Self {
        LedgerError::TransactionNotFound {
            tx,
            operation: operation.to_string(),
        }
    }

    /// Create a CourseTransactionNotFound error
    pub fn course_transaction_not_found(id: CourseTransactionId, operation: &str) -> Self {
        LedgerError::CourseTransactionNotFound {
            id,
            operation: operation.to_string(),
        }
    }

    /// Create a NoEligibleTransactions error
    pub fn no_eligible_transactions(requested: usize, operation: &str) -> Self {
        LedgerError::NoEligibleTransactions {
            requested,
            operation: operation.to_string(),
        }
    }

    /// Create an InvalidState error
    pub fn invalid_state(tx: TransactionId, status: TransactionStatus, operation: &str) -> Self {
        LedgerError::InvalidState {
            tx,
            status,
            operation: operation.to_string(),
        }
    }

    /// Create an InsufficientBalance error
    pub fn insufficient_balance(owner: OwnerId, balance: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientBalance {
            owner,
            balance,
            requested,
        }
    }

    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Decimal, reason: &str) -> Self {
        LedgerError::InvalidAmount {
            amount,
            reason: reason.to_string(),
        }
    }

    /// Create an InvalidInput error
    pub fn invalid_input(field: &str, message: impl Into<String>) -> Self {
        LedgerError::InvalidInput {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Create an Unauthorized error
    pub fn unauthorized(operation: &str) -> Self {
        LedgerError::Unauthorized {
            operation: operation.to_string(),
        }
    }

    /// Create a Forbidden error
    pub fn forbidden(actor: OwnerId, operation: &str) -> Self {
        LedgerError::Forbidden {
            actor,
            operation: operation.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, wallet: WalletId) -> Self {
        LedgerError::ArithmeticOverflow {
            operation: operation.to_string(),
            wallet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal::Decimal;

    #[rstest]
    #[case::wallet_not_found(
        LedgerError::WalletNotFound { owner: 7 },
        "Wallet not found for owner 7"
    )]
    #[case::wallet_id_not_found(LedgerError::wallet_id_not_found(3), "Wallet 3 not found")]
    #[case::transaction_not_found(
        LedgerError::transaction_not_found(999, "approve"),
        "Transaction 999 not found for approve"
    )]
    #[case::no_eligible(
        LedgerError::no_eligible_transactions(3, "bulk approve"),
        "No pending credit purchases among 3 ids for bulk approve"
    )]
    #[case::invalid_state(
        LedgerError::invalid_state(4, TransactionStatus::Completed, "approve"),
        "Transaction 4 is COMPLETED, cannot approve"
    )]
    #[case::insufficient_balance(
        LedgerError::insufficient_balance(1, Decimal::new(100, 0), Decimal::new(-150, 0)),
        "Insufficient balance for owner 1: balance 100, change -150"
    )]
    #[case::invalid_amount(
        LedgerError::invalid_amount(Decimal::ZERO, "must be positive"),
        "Invalid amount 0: must be positive"
    )]
    #[case::forbidden(
        LedgerError::forbidden(5, "approve"),
        "Actor 5 is not allowed to approve"
    )]
    #[case::parse_error_with_line(
        LedgerError::ParseError { line: Some(42), message: "bad field".to_string() },
        "Parse error at line 42: bad field"
    )]
    #[case::parse_error_without_line(
        LedgerError::ParseError { line: None, message: "bad field".to_string() },
        "Parse error: bad field"
    )]
    fn test_error_display(#[case] error: LedgerError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case(LedgerError::wallet_not_found(1), ErrorKind::NotFound)]
    #[case(LedgerError::wallet_id_not_found(3), ErrorKind::NotFound)]
    #[case(LedgerError::no_eligible_transactions(0, "bulk reject"), ErrorKind::NotFound)]
    #[case(LedgerError::invalid_state(1, TransactionStatus::Failed, "reject"), ErrorKind::InvalidState)]
    #[case(LedgerError::AlreadyRefunded { id: 1 }, ErrorKind::InvalidState)]
    #[case(LedgerError::insufficient_balance(1, Decimal::ZERO, Decimal::NEGATIVE_ONE), ErrorKind::InsufficientBalance)]
    #[case(LedgerError::invalid_input("ids", "empty"), ErrorKind::Validation)]
    #[case(LedgerError::unauthorized("approve"), ErrorKind::Unauthorized)]
    #[case(LedgerError::forbidden(2, "approve"), ErrorKind::Forbidden)]
    #[case(LedgerError::arithmetic_overflow("adjust", 1), ErrorKind::Arithmetic)]
    fn test_error_kind(#[case] error: LedgerError, #[case] expected: ErrorKind) {
        assert_eq!(error.kind(), expected);
        assert!(error.is_retry_safe());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: LedgerError = io_error.into();
        assert!(matches!(error, LedgerError::IoError { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
        assert!(!error.is_retry_safe());
    }
}
