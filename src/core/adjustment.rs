//! Administrative balance corrections
//!
//! An adjustment is a COMPLETED CREDIT_ADJUSTMENT transaction carrying a
//! signed amount. Debits are checked for solvency twice: once against a
//! snapshot for a cheap early failure, and again inside the commit under the
//! wallet lock, so a debit racing with another debit cannot overdraw.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use super::unit_of_work::UnitOfWork;
use super::wallet_store::WalletStore;
use super::workflow::first_transaction;
use crate::types::{
    LedgerError, OwnerId, TransactionStatus, TransactionType, WalletTransaction,
};

/// Engine for direct signed balance corrections
#[derive(Debug, Clone)]
pub struct AdjustmentEngine {
    store: Arc<WalletStore>,
}

impl AdjustmentEngine {
    pub fn new(store: Arc<WalletStore>) -> Self {
        Self { store }
    }

    /// Apply a signed correction to the owner's wallet
    ///
    /// # Arguments
    ///
    /// * `owner_id` - Owner whose wallet is adjusted (created if untouched)
    /// * `signed_amount` - Non-zero change; negative values debit
    /// * `reason` - Why the correction was made, stored as the notes
    ///
    /// # Returns
    ///
    /// * `Ok(WalletTransaction)` - The COMPLETED adjustment
    /// * `Err(LedgerError::InvalidAmount)` - If `signed_amount` is zero
    /// * `Err(LedgerError::InvalidInput)` - If `reason` is blank
    /// * `Err(LedgerError::InsufficientBalance)` - If the balance would go
    ///   negative; nothing is written
    pub fn adjust(
        &self,
        owner_id: OwnerId,
        signed_amount: Decimal,
        reason: &str,
    ) -> Result<WalletTransaction, LedgerError> {
        if signed_amount.is_zero() {
            return Err(LedgerError::invalid_amount(signed_amount, "must not be zero"));
        }
        if reason.trim().is_empty() {
            return Err(LedgerError::invalid_input("reason", "an adjustment needs a reason"));
        }

        let wallet = self.store.get_or_create(owner_id)?;
        let projected = wallet
            .balance
            .checked_add(signed_amount)
            .ok_or_else(|| LedgerError::arithmetic_overflow("adjust", wallet.id))?;
        if projected < Decimal::ZERO {
            warn!(owner_id, balance = %wallet.balance, change = %signed_amount, "adjustment would overdraw");
            return Err(LedgerError::insufficient_balance(
                owner_id,
                wallet.balance,
                signed_amount,
            ));
        }

        let tx = WalletTransaction {
            id: self.store.next_transaction_id(),
            wallet_id: wallet.id,
            owner_id,
            tx_type: TransactionType::CreditAdjustment,
            amount: signed_amount,
            requested_amount: None,
            status: TransactionStatus::Completed,
            invoice_ref: None,
            notes: Some(reason.trim().to_string()),
            created_at: self.store.now(),
            processed_at: None,
            linked_course_transaction_id: None,
        };

        let mut unit = UnitOfWork::new("adjust");
        unit.insert_transaction(tx).require_solvent(wallet.id);
        let receipt = self.store.commit(unit).inspect_err(|e| {
            warn!(owner_id, change = %signed_amount, error = %e, "adjustment rejected");
        })?;
        let tx = first_transaction(receipt.transactions, "adjust")?;

        info!(tx = tx.id, owner_id, amount = %tx.amount, "balance adjusted");
        Ok(tx)
    }
}
