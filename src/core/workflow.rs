//! Credit purchase request workflow
//!
//! This module provides the `WorkflowEngine` struct, which drives a
//! CREDIT_PURCHASE request through its lifecycle:
//!
//! ```text
//! submit_request ──► PENDING ──approve──► COMPLETED  (balance += final amount)
//!                       │
//!                       ├──reject───────► FAILED     (no balance effect)
//!                       └──cancel_request► CANCELLED (no balance effect)
//! ```
//!
//! Every transition is committed through the wallet store as one unit, so a
//! request is never COMPLETED without its wallet having been credited.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use super::unit_of_work::UnitOfWork;
use super::wallet_store::WalletStore;
use crate::types::{
    LedgerError, OwnerId, TransactionId, TransactionStatus, TransactionType, WalletTransaction,
};

/// Request/approval engine for credit purchases
#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    store: Arc<WalletStore>,
}

impl WorkflowEngine {
    pub fn new(store: Arc<WalletStore>) -> Self {
        Self { store }
    }

    /// Record a request to buy `amount` credits
    ///
    /// # Arguments
    ///
    /// * `owner_id` - Owner whose wallet will be credited on approval
    /// * `amount` - Requested amount, must be positive
    /// * `invoice_ref` - Opaque reference to the invoice evidence
    ///
    /// # Returns
    ///
    /// * `Ok(WalletTransaction)` - The new PENDING transaction
    /// * `Err(LedgerError::InvalidAmount)` - If `amount` is not positive
    pub fn submit_request(
        &self,
        owner_id: OwnerId,
        amount: Decimal,
        invoice_ref: Option<String>,
    ) -> Result<WalletTransaction, LedgerError> {
        ensure_positive(amount)?;

        let wallet = self.store.get_or_create(owner_id)?;
        let tx = WalletTransaction {
            id: self.store.next_transaction_id(),
            wallet_id: wallet.id,
            owner_id,
            tx_type: TransactionType::CreditPurchase,
            amount,
            requested_amount: Some(amount),
            status: TransactionStatus::Pending,
            invoice_ref: invoice_ref.filter(|r| !r.trim().is_empty()),
            notes: None,
            created_at: self.store.now(),
            processed_at: None,
            linked_course_transaction_id: None,
        };

        let mut unit = UnitOfWork::new("submit request");
        unit.insert_transaction(tx);
        let receipt = self.store.commit(unit)?;
        let tx = first_transaction(receipt.transactions, "submit request")?;

        info!(tx = tx.id, owner_id, %amount, "credit purchase requested");
        Ok(tx)
    }

    /// Approve a pending request, crediting `final_amount`
    ///
    /// `final_amount` may differ from the requested amount; the requested
    /// amount stays on record in `requested_amount`.
    ///
    /// # Returns
    ///
    /// * `Ok(WalletTransaction)` - The COMPLETED transaction
    /// * `Err(LedgerError::InvalidAmount)` - If `final_amount` is not positive
    /// * `Err(LedgerError::TransactionNotFound)` - If the id is unknown
    /// * `Err(LedgerError::InvalidState)` - If the request is no longer PENDING
    pub fn approve(
        &self,
        tx_id: TransactionId,
        final_amount: Decimal,
    ) -> Result<WalletTransaction, LedgerError> {
        ensure_positive(final_amount)?;
        self.pending_request(tx_id, "approve")?;

        let mut unit = UnitOfWork::new("approve");
        unit.complete(tx_id, Some(final_amount));
        let receipt = self.store.commit(unit).inspect_err(|e| {
            warn!(tx = tx_id, error = %e, "approval rejected");
        })?;
        let tx = first_transaction(receipt.transactions, "approve")?;

        info!(
            tx = tx.id,
            owner_id = tx.owner_id,
            amount = %tx.amount,
            requested = ?tx.requested_amount,
            "credit purchase approved"
        );
        Ok(tx)
    }

    /// Reject a pending request; no balance effect
    ///
    /// # Returns
    ///
    /// * `Ok(WalletTransaction)` - The FAILED transaction carrying `reason`
    /// * `Err(LedgerError::TransactionNotFound)` - If the id is unknown
    /// * `Err(LedgerError::InvalidState)` - If the request is no longer PENDING
    pub fn reject(
        &self,
        tx_id: TransactionId,
        reason: Option<String>,
    ) -> Result<WalletTransaction, LedgerError> {
        self.pending_request(tx_id, "reject")?;

        let mut unit = UnitOfWork::new("reject");
        unit.fail(tx_id, reason.filter(|r| !r.trim().is_empty()));
        let receipt = self.store.commit(unit)?;
        let tx = first_transaction(receipt.transactions, "reject")?;

        info!(tx = tx.id, owner_id = tx.owner_id, reason = ?tx.notes, "credit purchase rejected");
        Ok(tx)
    }

    /// Withdraw the owner's own pending request
    ///
    /// A transaction belonging to another owner is reported as not found so
    /// its existence is not disclosed.
    pub fn cancel_request(
        &self,
        owner_id: OwnerId,
        tx_id: TransactionId,
    ) -> Result<WalletTransaction, LedgerError> {
        let tx = self.pending_request(tx_id, "cancel")?;
        if tx.owner_id != owner_id {
            return Err(LedgerError::transaction_not_found(tx_id, "cancel"));
        }

        let mut unit = UnitOfWork::new("cancel");
        unit.cancel(tx_id, Some("cancelled by owner".to_string()));
        let receipt = self.store.commit(unit)?;
        let tx = first_transaction(receipt.transactions, "cancel")?;

        info!(tx = tx.id, owner_id, "credit purchase cancelled");
        Ok(tx)
    }

    /// Load `tx_id` and check it is a PENDING credit purchase
    ///
    /// The store re-checks the status under the wallet lock at commit time;
    /// this early check only gives a precise error without taking locks.
    fn pending_request(
        &self,
        tx_id: TransactionId,
        operation: &str,
    ) -> Result<WalletTransaction, LedgerError> {
        let tx = self
            .store
            .transaction(tx_id)
            .ok_or_else(|| LedgerError::transaction_not_found(tx_id, operation))?;

        if tx.status != TransactionStatus::Pending
            || tx.tx_type != TransactionType::CreditPurchase
        {
            warn!(tx = tx_id, status = %tx.status, operation, "request already processed");
            return Err(LedgerError::invalid_state(tx_id, tx.status, operation));
        }
        Ok(tx)
    }
}

pub(crate) fn ensure_positive(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::invalid_amount(amount, "must be positive"));
    }
    Ok(())
}

pub(crate) fn first_transaction(
    transactions: Vec<WalletTransaction>,
    operation: &str,
) -> Result<WalletTransaction, LedgerError> {
    transactions.into_iter().next().ok_or_else(|| {
        LedgerError::invalid_input("unit of work", format!("{} committed no transaction", operation))
    })
}
