//! Transaction-related types for the credit ledger
//!
//! This module defines wallet transactions, their types and statuses, and the
//! course-purchase record that links a COURSE_PURCHASE transaction to a course.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::LedgerError;
use super::wallet::{OwnerId, WalletId};

/// Wallet transaction identifier, assigned sequentially by the store
pub type TransactionId = u64;

/// Course transaction identifier, assigned sequentially by the store
pub type CourseTransactionId = u64;

/// Course identifier, supplied by the course catalog collaborator
pub type CourseId = u32;

/// Kinds of balance-affecting events recorded in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Credits bought by the owner
    ///
    /// Created PENDING by a request and credited only once approved.
    CreditPurchase,

    /// Credits spent on a course
    ///
    /// Recorded COMPLETED by the course-purchase collaborator with a negative
    /// amount.
    CoursePurchase,

    /// Credits returned for a refunded course purchase
    Refund,

    /// Manual correction or penalty applied by an administrator
    ///
    /// The only type that may be stored COMPLETED with a negative amount
    /// without a linked course purchase.
    CreditAdjustment,
}

impl TransactionType {
    /// All types, in reporting order
    pub const ALL: [TransactionType; 4] = [
        TransactionType::CreditPurchase,
        TransactionType::CoursePurchase,
        TransactionType::Refund,
        TransactionType::CreditAdjustment,
    ];

    /// Wire name of the type, as used in exports and filters
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::CreditPurchase => "CREDIT_PURCHASE",
            TransactionType::CoursePurchase => "COURSE_PURCHASE",
            TransactionType::Refund => "REFUND",
            TransactionType::CreditAdjustment => "CREDIT_ADJUSTMENT",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "CREDIT_PURCHASE" => Ok(TransactionType::CreditPurchase),
            "COURSE_PURCHASE" => Ok(TransactionType::CoursePurchase),
            "REFUND" => Ok(TransactionType::Refund),
            "CREDIT_ADJUSTMENT" => Ok(TransactionType::CreditAdjustment),
            _ => Err(LedgerError::invalid_input(
                "type",
                format!("unknown transaction type '{}'", s),
            )),
        }
    }
}

/// Lifecycle status of a wallet transaction
///
/// PENDING → COMPLETED | FAILED | CANCELLED is the only transition; every
/// other status is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(TransactionStatus::Pending),
            "COMPLETED" => Ok(TransactionStatus::Completed),
            "FAILED" => Ok(TransactionStatus::Failed),
            "CANCELLED" | "CANCELED" => Ok(TransactionStatus::Cancelled),
            _ => Err(LedgerError::invalid_input(
                "status",
                format!("unknown transaction status '{}'", s),
            )),
        }
    }
}

/// One entry of the ledger
///
/// Amounts are ledger-style signed values: credits are positive, course
/// purchases are stored negative. Use [`WalletTransaction::display_amount`]
/// when presenting an amount to a reader.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletTransaction {
    pub id: TransactionId,
    pub wallet_id: WalletId,
    /// Owner of the wallet, denormalized for filtering
    pub owner_id: OwnerId,
    pub tx_type: TransactionType,

    /// Signed amount; the final credited amount once a request is approved
    pub amount: Decimal,

    /// Amount originally asked for by a credit-purchase request
    ///
    /// Kept alongside `amount` so that an approval with a revised amount
    /// leaves both values on record.
    pub requested_amount: Option<Decimal>,

    pub status: TransactionStatus,

    /// Opaque reference to invoice evidence supplied with a request
    pub invoice_ref: Option<String>,

    /// Free-form notes: rejection reason, adjustment reason, refund reason
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,

    /// When a PENDING transaction was settled
    pub processed_at: Option<DateTime<Utc>>,

    pub linked_course_transaction_id: Option<CourseTransactionId>,
}

impl WalletTransaction {
    /// Amount as shown in statistics and exports
    ///
    /// Course purchases are stored as negative deltas but reported as
    /// positive magnitudes. Every other type is reported with its stored sign.
    pub fn display_amount(&self) -> Decimal {
        match self.tx_type {
            TransactionType::CoursePurchase => self.amount.abs(),
            _ => self.amount,
        }
    }

    /// Whether this transaction currently contributes to its wallet balance
    pub fn counts_toward_balance(&self) -> bool {
        self.status == TransactionStatus::Completed
    }
}

/// Status of a course purchase record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseTransactionStatus {
    Completed,
    Refunded,
}

/// A settled course purchase
///
/// Created COMPLETED together with its COURSE_PURCHASE wallet transaction.
/// It never enters the approval workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseTransaction {
    pub id: CourseTransactionId,
    pub owner_id: OwnerId,
    pub course_id: CourseId,
    /// Positive price paid
    pub purchase_price: Decimal,
    pub status: CourseTransactionStatus,
    pub valid_until: Option<DateTime<Utc>>,
    pub wallet_transaction_id: TransactionId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case("CREDIT_PURCHASE", TransactionType::CreditPurchase)]
    #[case("course_purchase", TransactionType::CoursePurchase)]
    #[case(" refund ", TransactionType::Refund)]
    #[case("credit-adjustment", TransactionType::CreditAdjustment)]
    fn test_parse_transaction_type(#[case] input: &str, #[case] expected: TransactionType) {
        assert_eq!(input.parse::<TransactionType>().unwrap(), expected);
    }

    #[rstest]
    #[case("pending", TransactionStatus::Pending)]
    #[case("COMPLETED", TransactionStatus::Completed)]
    #[case("Failed", TransactionStatus::Failed)]
    #[case("canceled", TransactionStatus::Cancelled)]
    fn test_parse_transaction_status(#[case] input: &str, #[case] expected: TransactionStatus) {
        assert_eq!(input.parse::<TransactionStatus>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_type_is_validation_error() {
        let err = "deposit".parse::<TransactionType>().unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput { .. }));
    }

    #[test]
    fn test_only_pending_is_not_terminal() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Completed.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Cancelled.is_terminal());
    }

    #[rstest]
    #[case(TransactionType::CoursePurchase, dec!(-30), dec!(30))]
    #[case(TransactionType::CreditAdjustment, dec!(-30), dec!(-30))]
    #[case(TransactionType::Refund, dec!(30), dec!(30))]
    fn test_display_amount(
        #[case] tx_type: TransactionType,
        #[case] stored: Decimal,
        #[case] shown: Decimal,
    ) {
        let tx = WalletTransaction {
            id: 1,
            wallet_id: 1,
            owner_id: 7,
            tx_type,
            amount: stored,
            requested_amount: None,
            status: TransactionStatus::Completed,
            invoice_ref: None,
            notes: None,
            created_at: Utc::now(),
            processed_at: None,
            linked_course_transaction_id: None,
        };
        assert_eq!(tx.display_amount(), shown);
    }
}
