//! Bulk approval and rejection of pending credit purchases
//!
//! This module provides the `BulkProcessor` struct, which settles many
//! pending requests in a single call.
//!
//! # Design
//!
//! A bulk call runs in two steps:
//!
//! 1. **Selection**: the raw ids are parsed and filtered down to
//!    transactions that are currently PENDING CREDIT_PURCHASE. Malformed,
//!    unknown, duplicate and already-processed ids are dropped and reported
//!    as skipped. An empty selection fails the call.
//! 2. **Commit**: every selected transaction is staged into one unit of work
//!    and committed at once. Either all of them transition or none do.
//!
//! If another writer settles a selected transaction between the two steps,
//! the commit reports it no longer PENDING; the processor then re-runs the
//! selection (which now excludes it) and commits again.
//!
//! Entries are independent, so staging order has no effect on the result.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use super::unit_of_work::UnitOfWork;
use super::wallet_store::WalletStore;
use crate::types::{
    ErrorKind, LedgerError, OwnerId, TransactionId, TransactionStatus, TransactionType, WalletId,
    WalletTransaction,
};

/// Attempts made when concurrent writers keep invalidating the selection
const MAX_ATTEMPTS: usize = 3;

/// Per-wallet summary of a bulk call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletBatchTotal {
    pub wallet_id: WalletId,
    pub owner_id: OwnerId,
    pub count: usize,
    /// Sum credited to the wallet (zero for rejections)
    pub credited: Decimal,
}

/// Result of a bulk call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkOutcome {
    /// Transactions that transitioned, in their committed state
    pub processed: Vec<WalletTransaction>,
    /// Raw ids that were excluded from the batch
    pub skipped: Vec<String>,
    /// Totals per affected wallet, by ascending wallet id
    pub wallets: Vec<WalletBatchTotal>,
}

impl BulkOutcome {
    pub fn total_credited(&self) -> Decimal {
        self.wallets.iter().map(|w| w.credited).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BulkAction {
    Approve,
    Reject,
}

impl BulkAction {
    fn operation(&self) -> &'static str {
        match self {
            BulkAction::Approve => "bulk approve",
            BulkAction::Reject => "bulk reject",
        }
    }
}

/// Batch settlement of pending credit purchases
#[derive(Debug, Clone)]
pub struct BulkProcessor {
    store: Arc<WalletStore>,
}

impl BulkProcessor {
    pub fn new(store: Arc<WalletStore>) -> Self {
        Self { store }
    }

    /// Approve every pending credit purchase among `ids`
    ///
    /// Each transaction is credited with its stored requested amount.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkOutcome)` - The selection was committed as one unit
    /// * `Err(LedgerError::InvalidInput)` - If `ids` is empty
    /// * `Err(LedgerError::NoEligibleTransactions)` - If no id qualifies
    pub fn bulk_approve<S: AsRef<str>>(&self, ids: &[S]) -> Result<BulkOutcome, LedgerError> {
        self.run(ids, BulkAction::Approve, None)
    }

    /// Reject every pending credit purchase among `ids`, sharing `reason`
    pub fn bulk_reject<S: AsRef<str>>(
        &self,
        ids: &[S],
        reason: Option<String>,
    ) -> Result<BulkOutcome, LedgerError> {
        self.run(ids, BulkAction::Reject, reason.filter(|r| !r.trim().is_empty()))
    }

    fn run<S: AsRef<str>>(
        &self,
        ids: &[S],
        action: BulkAction,
        reason: Option<String>,
    ) -> Result<BulkOutcome, LedgerError> {
        let operation = action.operation();
        if ids.is_empty() {
            return Err(LedgerError::invalid_input("ids", "no transaction ids given"));
        }

        let mut attempt = 1;
        loop {
            let (selected, skipped) = self.select(ids, operation)?;

            let mut unit = UnitOfWork::new(operation);
            for tx in &selected {
                match action {
                    BulkAction::Approve => unit.complete(tx.id, None),
                    BulkAction::Reject => unit.fail(tx.id, reason.clone()),
                };
            }

            match self.store.commit(unit) {
                Ok(receipt) => {
                    let wallets = summarize_by_wallet(&receipt.transactions);
                    let outcome = BulkOutcome {
                        processed: receipt.transactions,
                        skipped,
                        wallets,
                    };
                    info!(
                        operation,
                        processed = outcome.processed.len(),
                        skipped = outcome.skipped.len(),
                        credited = %outcome.total_credited(),
                        "bulk call committed"
                    );
                    return Ok(outcome);
                }
                Err(e) if e.kind() == ErrorKind::InvalidState && attempt < MAX_ATTEMPTS => {
                    warn!(operation, attempt, error = %e, "selection changed concurrently, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Split raw ids into eligible transactions and skipped ids
    fn select<S: AsRef<str>>(
        &self,
        ids: &[S],
        operation: &str,
    ) -> Result<(Vec<WalletTransaction>, Vec<String>), LedgerError> {
        let mut seen: HashSet<TransactionId> = HashSet::new();
        let mut selected = Vec::new();
        let mut skipped = Vec::new();

        for raw in ids {
            let raw = raw.as_ref();
            let eligible = raw
                .trim()
                .parse::<TransactionId>()
                .ok()
                .filter(|id| seen.insert(*id))
                .and_then(|id| self.store.transaction(id))
                .filter(|tx| {
                    tx.status == TransactionStatus::Pending
                        && tx.tx_type == TransactionType::CreditPurchase
                });

            match eligible {
                Some(tx) => selected.push(tx),
                None => skipped.push(raw.to_string()),
            }
        }

        if selected.is_empty() {
            warn!(operation, requested = ids.len(), "no eligible transactions");
            return Err(LedgerError::no_eligible_transactions(ids.len(), operation));
        }
        Ok((selected, skipped))
    }
}

/// Group settled transactions by wallet
///
/// Each wallet appears once; `credited` sums the amounts of the transactions
/// that were completed.
pub fn summarize_by_wallet(transactions: &[WalletTransaction]) -> Vec<WalletBatchTotal> {
    let mut by_wallet: BTreeMap<WalletId, WalletBatchTotal> = BTreeMap::new();

    for tx in transactions {
        let total = by_wallet.entry(tx.wallet_id).or_insert(WalletBatchTotal {
            wallet_id: tx.wallet_id,
            owner_id: tx.owner_id,
            count: 0,
            credited: Decimal::ZERO,
        });
        total.count += 1;
        if tx.status == TransactionStatus::Completed {
            total.credited += tx.amount;
        }
    }

    by_wallet.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AdjustmentEngine, WorkflowEngine};
    use rust_decimal_macros::dec;
    use std::thread;

    struct Fixture {
        store: Arc<WalletStore>,
        workflow: WorkflowEngine,
        bulk: BulkProcessor,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(WalletStore::new());
        Fixture {
            workflow: WorkflowEngine::new(Arc::clone(&store)),
            bulk: BulkProcessor::new(Arc::clone(&store)),
            store,
        }
    }

    #[test]
    fn test_bulk_approve_mixed_selection() {
        let f = fixture();
        let a = f.workflow.submit_request(1, dec!(20), None).unwrap();
        let b = f.workflow.submit_request(1, dec!(15), None).unwrap();
        let done = f.workflow.submit_request(1, dec!(99), None).unwrap();
        f.workflow.approve(done.id, dec!(99)).unwrap();

        let ids = vec![a.id.to_string(), done.id.to_string(), b.id.to_string(), "4040".to_string()];
        let outcome = f.bulk.bulk_approve(&ids).unwrap();

        assert_eq!(outcome.processed.len(), 2);
        assert_eq!(outcome.skipped, vec![done.id.to_string(), "4040".to_string()]);
        assert_eq!(outcome.total_credited(), dec!(35));
        assert_eq!(f.store.wallet(1).unwrap().balance, dec!(99) + dec!(35));
        assert_eq!(f.store.transaction(done.id).unwrap().amount, dec!(99));
        assert!(f.store.reconcile().is_empty());
    }

    #[test]
    fn test_bulk_approve_uses_stored_amounts_across_wallets() {
        let f = fixture();
        let a = f.workflow.submit_request(1, dec!(10), None).unwrap();
        let b = f.workflow.submit_request(2, dec!(25), None).unwrap();
        let c = f.workflow.submit_request(1, dec!(5), None).unwrap();

        let outcome = f
            .bulk
            .bulk_approve(&[a.id.to_string(), b.id.to_string(), c.id.to_string()])
            .unwrap();

        assert_eq!(outcome.wallets.len(), 2);
        assert_eq!(f.store.wallet(1).unwrap().balance, dec!(15));
        assert_eq!(f.store.wallet(2).unwrap().balance, dec!(25));
        let owner1 = outcome.wallets.iter().find(|w| w.owner_id == 1).unwrap();
        assert_eq!(owner1.count, 2);
        assert_eq!(owner1.credited, dec!(15));
    }

    #[test]
    fn test_malformed_and_duplicate_ids_are_skipped() {
        let f = fixture();
        let a = f.workflow.submit_request(1, dec!(10), None).unwrap();
        let id = a.id.to_string();

        let outcome = f.bulk.bulk_approve(&[id.as_str(), "not-an-id", id.as_str()]).unwrap();

        assert_eq!(outcome.processed.len(), 1);
        assert_eq!(outcome.skipped, vec!["not-an-id".to_string(), id.clone()]);
        assert_eq!(f.store.wallet(1).unwrap().balance, dec!(10));
    }

    #[test]
    fn test_empty_selection_is_not_found() {
        let f = fixture();
        let a = f.workflow.submit_request(1, dec!(10), None).unwrap();
        f.workflow.reject(a.id, None).unwrap();

        let err = f.bulk.bulk_approve(&[a.id.to_string(), "x".to_string()]).unwrap_err();

        assert_eq!(err, LedgerError::no_eligible_transactions(2, "bulk approve"));
    }

    #[test]
    fn test_empty_id_list_is_validation_error() {
        let f = fixture();
        let ids: Vec<String> = vec![];
        let err = f.bulk.bulk_reject(&ids, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_bulk_reject_shares_reason_and_leaves_balances() {
        let f = fixture();
        let a = f.workflow.submit_request(1, dec!(10), None).unwrap();
        let b = f.workflow.submit_request(2, dec!(20), None).unwrap();

        let outcome = f
            .bulk
            .bulk_reject(&[a.id.to_string(), b.id.to_string()], Some("fraud check".to_string()))
            .unwrap();

        assert_eq!(outcome.total_credited(), Decimal::ZERO);
        for tx in &outcome.processed {
            assert_eq!(tx.status, TransactionStatus::Failed);
            assert_eq!(tx.notes.as_deref(), Some("fraud check"));
        }
        assert_eq!(f.store.wallet(1).unwrap().balance, Decimal::ZERO);
        assert_eq!(f.store.wallet(2).unwrap().balance, Decimal::ZERO);
    }

    #[test]
    fn test_order_of_ids_does_not_matter() {
        let forward = fixture();
        let backward = fixture();
        let mut ids = Vec::new();
        for (owner, amount) in [(1, dec!(3)), (2, dec!(4)), (1, dec!(5))] {
            forward.workflow.submit_request(owner, amount, None).unwrap();
            let tx = backward.workflow.submit_request(owner, amount, None).unwrap();
            ids.push(tx.id.to_string());
        }

        forward.bulk.bulk_approve(&ids).unwrap();
        ids.reverse();
        backward.bulk.bulk_approve(&ids).unwrap();

        for owner in [1, 2] {
            assert_eq!(
                forward.store.wallet(owner).unwrap().balance,
                backward.store.wallet(owner).unwrap().balance
            );
        }
    }

    #[test]
    fn test_bulk_approve_racing_adjustments_keeps_invariant() {
        let f = fixture();
        let adjustments = AdjustmentEngine::new(Arc::clone(&f.store));
        adjustments.adjust(1, dec!(50), "seed").unwrap();
        let ids: Vec<String> = (0..20)
            .map(|_| f.workflow.submit_request(1, dec!(2), None).unwrap().id.to_string())
            .collect();

        let bulk = f.bulk.clone();
        let approver = thread::spawn(move || bulk.bulk_approve(&ids).unwrap());
        let debits: Vec<_> = (0..10)
            .map(|_| {
                let adjustments = adjustments.clone();
                thread::spawn(move || adjustments.adjust(1, dec!(-5), "fee").is_ok())
            })
            .collect();

        let outcome = approver.join().unwrap();
        let debited = debits.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();

        assert_eq!(outcome.processed.len(), 20);
        let expected = dec!(50) + dec!(40) - Decimal::from(debited as u64) * dec!(5);
        assert_eq!(f.store.wallet(1).unwrap().balance, expected);
        assert!(f.store.reconcile().is_empty());
    }
}
