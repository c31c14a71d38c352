//! Tabular export of ledger transactions
//!
//! This module provides the `ExportService` struct, which turns the
//! transactions selected by a [`TransactionFilter`] into flat rows, resolving
//! owner names and course titles through the [`Directory`] collaborator.
//!
//! The selection is the same one `transactions_matching` returns, in the same
//! newest-first order, so an export always has exactly as many rows as the
//! listing for the same filter.

use std::sync::Arc;

use chrono::SecondsFormat;
use serde::Serialize;

use super::traits::Directory;
use super::wallet_store::WalletStore;
use crate::types::{LedgerError, TransactionFilter, TransactionId, WalletTransaction};

/// One exported transaction
///
/// Field order is the column order of the CSV export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub id: TransactionId,
    /// Owner name, falling back to email, empty when unknown
    pub user: String,
    #[serde(rename = "type")]
    pub tx_type: String,
    /// Display amount (course purchases as positive magnitude)
    pub amount: String,
    pub status: String,
    /// Creation time, RFC 3339 with milliseconds
    pub date: String,
    /// Linked course title, empty when none
    pub course: String,
    pub notes: String,
}

/// Builds export rows from the store and the directory
#[derive(Clone)]
pub struct ExportService {
    store: Arc<WalletStore>,
    directory: Arc<dyn Directory>,
}

impl std::fmt::Debug for ExportService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportService")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl ExportService {
    pub fn new(store: Arc<WalletStore>, directory: Arc<dyn Directory>) -> Self {
        Self { store, directory }
    }

    /// Export every transaction matching `filter`
    ///
    /// No match yields an empty vector; the CSV writer still emits the
    /// header for it.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<ExportRow>)` - Rows, newest first
    /// * `Err(LedgerError::InvalidInput)` - If the filter's range is inverted
    pub fn export(&self, filter: &TransactionFilter) -> Result<Vec<ExportRow>, LedgerError> {
        filter.validate()?;
        Ok(self
            .store
            .transactions_matching(filter)
            .iter()
            .map(|tx| self.row(tx))
            .collect())
    }

    fn row(&self, tx: &WalletTransaction) -> ExportRow {
        let user = self
            .directory
            .user(tx.owner_id)
            .map(|profile| profile.display_name().to_string())
            .unwrap_or_default();

        let course = tx
            .linked_course_transaction_id
            .and_then(|id| self.store.course_transaction(id))
            .and_then(|record| self.directory.course_title(record.course_id))
            .unwrap_or_default();

        ExportRow {
            id: tx.id,
            user,
            tx_type: tx.tx_type.to_string(),
            amount: tx.display_amount().to_string(),
            status: tx.status.to_string(),
            date: tx.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            course,
            notes: tx.notes.clone().unwrap_or_default(),
        }
    }
}
