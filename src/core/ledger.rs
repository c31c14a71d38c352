//! Ledger façade
//!
//! This module provides the `Ledger` struct, the entry point for callers.
//! It owns the shared store, the directory handle and the configuration,
//! builds every engine from them, and checks the caller's role before any
//! operation touches storage.
//!
//! # Access rules
//!
//! | Operation                                   | Required actor          |
//! |---------------------------------------------|-------------------------|
//! | `submit_request`, `cancel_request`, `wallet`| the owner, or elevated  |
//! | `record_course_purchase`                    | the owner, or elevated  |
//! | `list_transactions`                         | own owner id, or elevated |
//! | everything else                             | elevated                |
//!
//! An anonymous actor is always `Unauthorized`; an authenticated actor
//! without the required role is `Forbidden`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::adjustment::AdjustmentEngine;
use super::bulk::{BulkOutcome, BulkProcessor};
use super::course_purchase::{CoursePurchase, CoursePurchaseRecorder};
use super::export::{ExportRow, ExportService};
use super::statistics::{LedgerStatistics, StatisticsAggregator};
use super::traits::Directory;
use super::wallet_store::WalletStore;
use super::workflow::WorkflowEngine;
use crate::types::{
    Actor, BalanceMismatch, CourseId, CourseTransactionId, DateRange, LedgerError, OwnerId, Page,
    TransactionFilter, TransactionId, Wallet, WalletTransaction,
};

/// Number of wallets reported by statistics unless configured otherwise
pub const DEFAULT_TOP_WALLETS: usize = 5;

/// Tunables of the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Size of the busiest-wallets list in statistics
    pub top_wallets: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            top_wallets: DEFAULT_TOP_WALLETS,
        }
    }
}

/// Role-checked access to every ledger operation
#[derive(Debug, Clone)]
pub struct Ledger {
    store: Arc<WalletStore>,
    config: LedgerConfig,
    workflow: WorkflowEngine,
    adjustments: AdjustmentEngine,
    bulk: BulkProcessor,
    courses: CoursePurchaseRecorder,
    statistics: StatisticsAggregator,
    exports: ExportService,
}

impl Ledger {
    /// Build a ledger over `store`
    ///
    /// # Arguments
    ///
    /// * `store` - Shared storage, possibly already populated
    /// * `directory` - Source of display names and course titles
    /// * `config` - Tunables
    pub fn new(store: Arc<WalletStore>, directory: Arc<dyn Directory>, config: LedgerConfig) -> Self {
        Self {
            workflow: WorkflowEngine::new(Arc::clone(&store)),
            adjustments: AdjustmentEngine::new(Arc::clone(&store)),
            bulk: BulkProcessor::new(Arc::clone(&store)),
            courses: CoursePurchaseRecorder::new(Arc::clone(&store)),
            statistics: StatisticsAggregator::new(Arc::clone(&store), config.top_wallets),
            exports: ExportService::new(Arc::clone(&store), directory),
            store,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Underlying store, for maintenance reads such as reconciliation
    pub fn store(&self) -> &Arc<WalletStore> {
        &self.store
    }

    pub fn submit_request(
        &self,
        actor: &Actor,
        owner_id: OwnerId,
        amount: Decimal,
        invoice_ref: Option<String>,
    ) -> Result<WalletTransaction, LedgerError> {
        actor.require_owner_or_elevated(owner_id, "submit request")?;
        self.workflow.submit_request(owner_id, amount, invoice_ref)
    }

    pub fn approve(
        &self,
        actor: &Actor,
        tx_id: TransactionId,
        final_amount: Decimal,
    ) -> Result<WalletTransaction, LedgerError> {
        actor.require_elevated("approve")?;
        self.workflow.approve(tx_id, final_amount)
    }

    pub fn reject(
        &self,
        actor: &Actor,
        tx_id: TransactionId,
        reason: Option<String>,
    ) -> Result<WalletTransaction, LedgerError> {
        actor.require_elevated("reject")?;
        self.workflow.reject(tx_id, reason)
    }

    pub fn cancel_request(
        &self,
        actor: &Actor,
        owner_id: OwnerId,
        tx_id: TransactionId,
    ) -> Result<WalletTransaction, LedgerError> {
        actor.require_owner_or_elevated(owner_id, "cancel")?;
        self.workflow.cancel_request(owner_id, tx_id)
    }

    pub fn adjust(
        &self,
        actor: &Actor,
        owner_id: OwnerId,
        signed_amount: Decimal,
        reason: &str,
    ) -> Result<WalletTransaction, LedgerError> {
        actor.require_elevated("adjust")?;
        self.adjustments.adjust(owner_id, signed_amount, reason)
    }

    pub fn bulk_approve<S: AsRef<str>>(
        &self,
        actor: &Actor,
        ids: &[S],
    ) -> Result<BulkOutcome, LedgerError> {
        actor.require_elevated("bulk approve")?;
        self.bulk.bulk_approve(ids)
    }

    pub fn bulk_reject<S: AsRef<str>>(
        &self,
        actor: &Actor,
        ids: &[S],
        reason: Option<String>,
    ) -> Result<BulkOutcome, LedgerError> {
        actor.require_elevated("bulk reject")?;
        self.bulk.bulk_reject(ids, reason)
    }

    pub fn record_course_purchase(
        &self,
        actor: &Actor,
        owner_id: OwnerId,
        course_id: CourseId,
        price: Decimal,
        valid_until: Option<DateTime<Utc>>,
    ) -> Result<CoursePurchase, LedgerError> {
        actor.require_owner_or_elevated(owner_id, "course purchase")?;
        self.courses
            .record_course_purchase(owner_id, course_id, price, valid_until)
    }

    pub fn record_refund(
        &self,
        actor: &Actor,
        course_transaction_id: CourseTransactionId,
        reason: Option<String>,
    ) -> Result<WalletTransaction, LedgerError> {
        actor.require_elevated("refund")?;
        self.courses.record_refund(course_transaction_id, reason)
    }

    pub fn get_statistics(
        &self,
        actor: &Actor,
        range: DateRange,
    ) -> Result<LedgerStatistics, LedgerError> {
        actor.require_elevated("statistics")?;
        self.statistics.compute(range)
    }

    pub fn export(
        &self,
        actor: &Actor,
        filter: &TransactionFilter,
    ) -> Result<Vec<ExportRow>, LedgerError> {
        actor.require_elevated("export")?;
        self.exports.export(filter)
    }

    /// The owner's wallet, created empty on first access
    pub fn wallet(&self, actor: &Actor, owner_id: OwnerId) -> Result<Wallet, LedgerError> {
        actor.require_owner_or_elevated(owner_id, "view wallet")?;
        self.store.get_or_create(owner_id)
    }

    /// Every wallet, by ascending owner id
    pub fn wallets(&self, actor: &Actor) -> Result<Vec<Wallet>, LedgerError> {
        actor.require_elevated("list wallets")?;
        Ok(self.store.all_wallets())
    }

    /// Newest-first page of the transactions matching `filter`
    ///
    /// A non-elevated actor must restrict the filter to their own owner id.
    pub fn list_transactions(
        &self,
        actor: &Actor,
        filter: &TransactionFilter,
        page: Option<Page>,
    ) -> Result<Vec<WalletTransaction>, LedgerError> {
        match filter.owner_id {
            Some(owner_id) => actor.require_owner_or_elevated(owner_id, "list transactions")?,
            None => actor.require_elevated("list transactions")?,
        }
        filter.validate()?;

        let page = page.unwrap_or_default();
        Ok(self
            .store
            .transactions_matching(filter)
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .collect())
    }

    /// Wallets whose balance disagrees with their completed transactions
    pub fn reconcile(&self, actor: &Actor) -> Result<Vec<BalanceMismatch>, LedgerError> {
        actor.require_elevated("reconcile")?;
        Ok(self.store.reconcile())
    }
}
