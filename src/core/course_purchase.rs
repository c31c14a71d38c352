//! Course purchases and refunds
//!
//! Course purchases never pass through the approval workflow: the purchase
//! is recorded COMPLETED together with its [`CourseTransaction`], and a
//! refund is recorded COMPLETED together with the course record's status
//! change. Both are single units of work.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::unit_of_work::UnitOfWork;
use super::wallet_store::WalletStore;
use super::workflow::{ensure_positive, first_transaction};
use crate::types::{
    CourseId, CourseTransaction, CourseTransactionId, CourseTransactionStatus, LedgerError,
    OwnerId, TransactionStatus, TransactionType, WalletTransaction,
};

/// A recorded purchase: the wallet debit and the course record it pays for
#[derive(Debug, Clone, PartialEq)]
pub struct CoursePurchase {
    pub transaction: WalletTransaction,
    pub course_transaction: CourseTransaction,
}

/// Records course purchases and their refunds
#[derive(Debug, Clone)]
pub struct CoursePurchaseRecorder {
    store: Arc<WalletStore>,
}

impl CoursePurchaseRecorder {
    pub fn new(store: Arc<WalletStore>) -> Self {
        Self { store }
    }

    /// Debit `price` from the owner's wallet for `course_id`
    ///
    /// # Returns
    ///
    /// * `Ok(CoursePurchase)` - The COMPLETED debit and its course record
    /// * `Err(LedgerError::InvalidAmount)` - If `price` is not positive
    /// * `Err(LedgerError::InsufficientBalance)` - If the wallet cannot cover
    ///   the price; nothing is written
    pub fn record_course_purchase(
        &self,
        owner_id: OwnerId,
        course_id: CourseId,
        price: Decimal,
        valid_until: Option<DateTime<Utc>>,
    ) -> Result<CoursePurchase, LedgerError> {
        ensure_positive(price)?;

        let wallet = self.store.get_or_create(owner_id)?;
        if wallet.balance < price {
            warn!(owner_id, course_id, balance = %wallet.balance, %price, "balance cannot cover course");
            return Err(LedgerError::insufficient_balance(owner_id, wallet.balance, -price));
        }

        let tx_id = self.store.next_transaction_id();
        let course_tx_id = self.store.next_course_transaction_id();
        let tx = WalletTransaction {
            id: tx_id,
            wallet_id: wallet.id,
            owner_id,
            tx_type: TransactionType::CoursePurchase,
            amount: -price,
            requested_amount: None,
            status: TransactionStatus::Completed,
            invoice_ref: None,
            notes: None,
            created_at: self.store.now(),
            processed_at: None,
            linked_course_transaction_id: Some(course_tx_id),
        };
        let record = CourseTransaction {
            id: course_tx_id,
            owner_id,
            course_id,
            purchase_price: price,
            status: CourseTransactionStatus::Completed,
            valid_until,
            wallet_transaction_id: tx_id,
        };

        let mut unit = UnitOfWork::new("course purchase");
        unit.insert_transaction(tx)
            .insert_course_transaction(record)
            .require_solvent(wallet.id);
        let mut receipt = self.store.commit(unit).inspect_err(|e| {
            warn!(owner_id, course_id, error = %e, "course purchase rejected");
        })?;

        let transaction = first_transaction(receipt.transactions, "course purchase")?;
        let course_transaction = receipt.course_transactions.pop().ok_or_else(|| {
            LedgerError::invalid_input("unit of work", "course purchase committed no course record")
        })?;

        info!(tx = transaction.id, owner_id, course_id, %price, "course purchased");
        Ok(CoursePurchase {
            transaction,
            course_transaction,
        })
    }

    /// Credit the purchase price of a course transaction back to its owner
    ///
    /// # Returns
    ///
    /// * `Ok(WalletTransaction)` - The COMPLETED refund
    /// * `Err(LedgerError::CourseTransactionNotFound)` - Unknown course record
    /// * `Err(LedgerError::AlreadyRefunded)` - A refund was already recorded
    pub fn record_refund(
        &self,
        course_transaction_id: CourseTransactionId,
        reason: Option<String>,
    ) -> Result<WalletTransaction, LedgerError> {
        let record = self
            .store
            .course_transaction(course_transaction_id)
            .ok_or_else(|| LedgerError::course_transaction_not_found(course_transaction_id, "refund"))?;
        if record.status == CourseTransactionStatus::Refunded {
            return Err(LedgerError::AlreadyRefunded {
                id: course_transaction_id,
            });
        }

        let wallet = self.store.get_or_create(record.owner_id)?;
        let tx = WalletTransaction {
            id: self.store.next_transaction_id(),
            wallet_id: wallet.id,
            owner_id: record.owner_id,
            tx_type: TransactionType::Refund,
            amount: record.purchase_price,
            requested_amount: None,
            status: TransactionStatus::Completed,
            invoice_ref: None,
            notes: reason.filter(|r| !r.trim().is_empty()),
            created_at: self.store.now(),
            processed_at: None,
            linked_course_transaction_id: Some(course_transaction_id),
        };

        let mut unit = UnitOfWork::new("refund");
        unit.mark_refunded(course_transaction_id).insert_transaction(tx);
        let receipt = self.store.commit(unit).inspect_err(|e| {
            warn!(course_tx = course_transaction_id, error = %e, "refund rejected");
        })?;
        let tx = first_transaction(receipt.transactions, "refund")?;

        info!(
            tx = tx.id,
            course_tx = course_transaction_id,
            owner_id = tx.owner_id,
            amount = %tx.amount,
            "course refunded"
        );
        Ok(tx)
    }
}
