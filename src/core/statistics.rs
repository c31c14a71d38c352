//! Ledger statistics
//!
//! This module provides the `StatisticsAggregator` struct, a pure read over
//! one consistent snapshot of the store.
//!
//! Within the requested creation-time window, only COMPLETED transactions are
//! counted. Amounts are reported as display amounts, so course purchases
//! contribute their positive magnitude. The PENDING count is global: it
//! reflects the current approval backlog regardless of the window.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use super::wallet_store::WalletStore;
use crate::types::{
    DateRange, LedgerError, OwnerId, TransactionStatus, TransactionType, WalletId,
    WalletTransaction,
};

/// Decimal places of the reported average
const AVERAGE_DP: u32 = 2;

/// Sum and count of one transaction type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeTotals {
    pub tx_type: TransactionType,
    pub total: Decimal,
    pub count: usize,
}

/// Activity of one wallet within the window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletActivity {
    pub wallet_id: WalletId,
    pub owner_id: OwnerId,
    pub transaction_count: usize,
    pub total_amount: Decimal,
}

/// Aggregates over the COMPLETED transactions of a window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerStatistics {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// One entry per transaction type, always present, in reporting order
    pub totals: Vec<TypeTotals>,
    pub completed_count: usize,
    /// Mean display amount of every COMPLETED transaction, window ignored,
    /// rounded to two decimal places
    pub average_amount: Decimal,
    /// PENDING transactions across the whole ledger
    pub pending_count: usize,
    /// Busiest wallets by completed count, ties by ascending wallet id
    pub top_wallets: Vec<WalletActivity>,
}

impl LedgerStatistics {
    /// Totals for one type
    pub fn totals_for(&self, tx_type: TransactionType) -> Option<&TypeTotals> {
        self.totals.iter().find(|t| t.tx_type == tx_type)
    }
}

/// Computes [`LedgerStatistics`] from the store
#[derive(Debug, Clone)]
pub struct StatisticsAggregator {
    store: Arc<WalletStore>,
    top_wallets: usize,
}

impl StatisticsAggregator {
    /// # Arguments
    ///
    /// * `store` - Store to read from
    /// * `top_wallets` - Number of wallets reported in `top_wallets`
    pub fn new(store: Arc<WalletStore>, top_wallets: usize) -> Self {
        Self { store, top_wallets }
    }

    /// Compute statistics for `range`
    ///
    /// An empty window yields zero sums and counts, not an error.
    ///
    /// # Returns
    ///
    /// * `Ok(LedgerStatistics)` - The aggregates
    /// * `Err(LedgerError::InvalidInput)` - If the range starts after it ends
    pub fn compute(&self, range: DateRange) -> Result<LedgerStatistics, LedgerError> {
        range.validate()?;
        let snapshot = self.store.snapshot();

        let pending_count = snapshot
            .transactions
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Pending)
            .count();

        let all_completed: Vec<&WalletTransaction> = snapshot
            .transactions
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Completed)
            .collect();
        let completed: Vec<&WalletTransaction> = all_completed
            .iter()
            .copied()
            .filter(|tx| range.contains(tx.created_at))
            .collect();

        let totals = TransactionType::ALL
            .iter()
            .map(|&tx_type| {
                let of_type = completed.iter().filter(|tx| tx.tx_type == tx_type);
                TypeTotals {
                    tx_type,
                    total: of_type.clone().map(|tx| tx.display_amount()).sum(),
                    count: of_type.count(),
                }
            })
            .collect();

        // The average spans the whole ledger, like the pending count
        let sum: Decimal = all_completed.iter().map(|tx| tx.display_amount()).sum();
        let average_amount = if all_completed.is_empty() {
            Decimal::ZERO
        } else {
            (sum / Decimal::from(all_completed.len()))
                .round_dp_with_strategy(AVERAGE_DP, RoundingStrategy::MidpointAwayFromZero)
        };

        Ok(LedgerStatistics {
            start_date: range.start,
            end_date: range.end,
            totals,
            completed_count: completed.len(),
            average_amount,
            pending_count,
            top_wallets: self.top_wallets(&completed),
        })
    }

    fn top_wallets(&self, completed: &[&WalletTransaction]) -> Vec<WalletActivity> {
        let mut by_wallet: HashMap<WalletId, WalletActivity> = HashMap::new();
        for tx in completed {
            let activity = by_wallet.entry(tx.wallet_id).or_insert(WalletActivity {
                wallet_id: tx.wallet_id,
                owner_id: tx.owner_id,
                transaction_count: 0,
                total_amount: Decimal::ZERO,
            });
            activity.transaction_count += 1;
            activity.total_amount += tx.display_amount();
        }

        let mut ranked: Vec<WalletActivity> = by_wallet.into_values().collect();
        ranked.sort_by_key(|a| (Reverse(a.transaction_count), a.wallet_id));
        ranked.truncate(self.top_wallets);
        ranked
    }
}
