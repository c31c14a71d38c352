//! Thread-safe wallet and transaction storage
//!
//! This module provides the `WalletStore` struct, which owns every wallet,
//! wallet transaction and course transaction of the ledger and is the only
//! component allowed to change them.
//!
//! # Design
//!
//! Records live in `DashMap`s for fine-grained concurrent access. Writes go
//! through [`WalletStore::commit`], which runs in three phases:
//!
//! 1. **Lock**: resolve every wallet the unit touches and take their
//!    per-wallet locks in ascending id order, so two units can never wait on
//!    each other in a cycle.
//! 2. **Validate**: check every staged write against the current state and
//!    compute the per-wallet balance deltas with checked arithmetic. Any
//!    failure returns here, before a single write.
//! 3. **Apply**: write all records and apply the balance deltas while holding
//!    the commit gate exclusively. Readers take the gate shared, so they see
//!    either none or all of a unit.
//!
//! # Thread Safety
//!
//! Two units touching the same wallet serialize on its lock; units touching
//! disjoint wallets validate concurrently and only contend on the short apply
//! phase. Balance deltas are applied as increments under the wallet lock, so
//! concurrent deltas on one wallet are never lost.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::debug;

use super::unit_of_work::{Settlement, UnitOfWork, WriteOp};
use crate::types::{
    BalanceMismatch, CourseTransaction, CourseTransactionId, CourseTransactionStatus,
    LedgerError, OwnerId, TransactionFilter, TransactionId, TransactionStatus, Wallet, WalletId,
    WalletTransaction,
};

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Records written by a successful commit, in their committed state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitReceipt {
    /// Inserted and settled wallet transactions, in staging order
    pub transactions: Vec<WalletTransaction>,
    /// Inserted and updated course transactions, in staging order
    pub course_transactions: Vec<CourseTransaction>,
    /// Wallets whose balance moved, by ascending id
    pub wallets: Vec<Wallet>,
}

/// Point-in-time copy of the whole ledger
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    pub wallets: HashMap<WalletId, Wallet>,
    pub transactions: Vec<WalletTransaction>,
    pub course_transactions: HashMap<CourseTransactionId, CourseTransaction>,
}

/// Thread-safe owner of all ledger state
pub struct WalletStore {
    wallets: DashMap<WalletId, Wallet>,
    owners: DashMap<OwnerId, WalletId>,
    transactions: DashMap<TransactionId, WalletTransaction>,
    course_transactions: DashMap<CourseTransactionId, CourseTransaction>,

    /// One lock per wallet, created on first use
    wallet_locks: DashMap<WalletId, Arc<Mutex<()>>>,

    /// Held exclusively while a unit is applied, shared by snapshot reads
    commit_gate: RwLock<()>,

    next_wallet_id: AtomicU32,
    next_transaction_id: AtomicU64,
    next_course_transaction_id: AtomicU64,

    clock: Clock,
}

impl fmt::Debug for WalletStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletStore")
            .field("wallets", &self.wallets.len())
            .field("transactions", &self.transactions.len())
            .field("course_transactions", &self.course_transactions.len())
            .finish_non_exhaustive()
    }
}

impl WalletStore {
    /// Create an empty store stamping records with the system clock
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    /// Create an empty store stamping records with `clock`
    pub fn with_clock<F>(clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self {
            wallets: DashMap::new(),
            owners: DashMap::new(),
            transactions: DashMap::new(),
            course_transactions: DashMap::new(),
            wallet_locks: DashMap::new(),
            commit_gate: RwLock::new(()),
            next_wallet_id: AtomicU32::new(1),
            next_transaction_id: AtomicU64::new(1),
            next_course_transaction_id: AtomicU64::new(1),
            clock: Box::new(clock),
        }
    }

    /// Current time according to the store's clock
    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Reserve a fresh wallet transaction id
    ///
    /// Ids reserved by units that later fail are never reused.
    pub fn next_transaction_id(&self) -> TransactionId {
        self.next_transaction_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Reserve a fresh course transaction id
    pub fn next_course_transaction_id(&self) -> CourseTransactionId {
        self.next_course_transaction_id
            .fetch_add(1, Ordering::Relaxed)
    }

    /// Get the owner's wallet, creating an empty one on first access
    ///
    /// If several threads race to create the same wallet, exactly one is
    /// created and all of them receive it.
    ///
    /// # Returns
    ///
    /// * `Ok(Wallet)` - The existing or newly created wallet
    /// * `Err(LedgerError::WalletNotFound)` - If the owner maps to a wallet
    ///   id the store does not hold
    pub fn get_or_create(&self, owner_id: OwnerId) -> Result<Wallet, LedgerError> {
        let mut created = None;
        let wallet_id = *self.owners.entry(owner_id).or_insert_with(|| {
            let id = self.next_wallet_id.fetch_add(1, Ordering::Relaxed);
            let wallet = Wallet::new(id, owner_id, self.now());
            self.wallets.insert(id, wallet.clone());
            debug!(wallet_id = id, owner_id, "wallet created");
            created = Some(wallet);
            id
        });
        if let Some(wallet) = created {
            return Ok(wallet);
        }

        let _gate = self.read_gate();
        self.wallets
            .get(&wallet_id)
            .map(|wallet| wallet.value().clone())
            .ok_or_else(|| LedgerError::wallet_not_found(owner_id))
    }

    /// Snapshot of the owner's wallet, if it was ever touched
    pub fn wallet(&self, owner_id: OwnerId) -> Option<Wallet> {
        let wallet_id = *self.owners.get(&owner_id)?;
        let _gate = self.read_gate();
        self.wallets.get(&wallet_id).map(|wallet| wallet.value().clone())
    }

    /// Snapshot of a wallet transaction
    pub fn transaction(&self, id: TransactionId) -> Option<WalletTransaction> {
        let _gate = self.read_gate();
        self.transactions.get(&id).map(|tx| tx.value().clone())
    }

    /// Snapshot of a course transaction
    pub fn course_transaction(&self, id: CourseTransactionId) -> Option<CourseTransaction> {
        let _gate = self.read_gate();
        self.course_transactions.get(&id).map(|ct| ct.value().clone())
    }

    /// All transactions matching `filter`, newest first (ties by descending id)
    pub fn transactions_matching(&self, filter: &TransactionFilter) -> Vec<WalletTransaction> {
        let mut matching: Vec<WalletTransaction> = {
            let _gate = self.read_gate();
            self.transactions
                .iter()
                .filter(|entry| filter.matches(entry.value()))
                .map(|entry| entry.value().clone())
                .collect()
        };
        sort_newest_first(&mut matching);
        matching
    }

    /// Consistent copy of every record
    pub fn snapshot(&self) -> LedgerSnapshot {
        let _gate = self.read_gate();
        LedgerSnapshot {
            wallets: self
                .wallets
                .iter()
                .map(|entry| (*entry.key(), entry.value().clone()))
                .collect(),
            transactions: self
                .transactions
                .iter()
                .map(|entry| entry.value().clone())
                .collect(),
            course_transactions: self
                .course_transactions
                .iter()
                .map(|entry| (*entry.key(), entry.value().clone()))
                .collect(),
        }
    }

    /// All wallets, by ascending owner id
    pub fn all_wallets(&self) -> Vec<Wallet> {
        let mut wallets: Vec<Wallet> = {
            let _gate = self.read_gate();
            self.wallets
                .iter()
                .map(|entry| entry.value().clone())
                .collect()
        };
        wallets.sort_by_key(|wallet| wallet.owner_id);
        wallets
    }

    /// Recompute every balance from the completed transactions
    ///
    /// Returns the wallets whose stored balance differs from the sum of
    /// their COMPLETED transaction amounts. Empty when the ledger is sound.
    pub fn reconcile(&self) -> Vec<BalanceMismatch> {
        let snapshot = self.snapshot();
        let mut computed: HashMap<WalletId, Decimal> = HashMap::new();
        for tx in snapshot
            .transactions
            .iter()
            .filter(|tx| tx.counts_toward_balance())
        {
            *computed.entry(tx.wallet_id).or_default() += tx.amount;
        }

        let mut mismatches: Vec<BalanceMismatch> = snapshot
            .wallets
            .values()
            .filter_map(|wallet| {
                let sum = computed.get(&wallet.id).copied().unwrap_or_default();
                (sum != wallet.balance).then(|| BalanceMismatch {
                    wallet_id: wallet.id,
                    owner_id: wallet.owner_id,
                    stored: wallet.balance,
                    computed: sum,
                })
            })
            .collect();
        mismatches.sort_by_key(|m| m.wallet_id);
        mismatches
    }

    /// Validate and apply a unit of work atomically
    ///
    /// # Returns
    ///
    /// * `Ok(CommitReceipt)` - every staged write was applied
    /// * `Err(LedgerError)` - nothing was written
    ///
    /// # Errors
    ///
    /// * `TransactionNotFound` - a settle targets an unknown transaction
    /// * `InvalidState` - a settle targets a transaction that is not PENDING,
    ///   or the unit settles the same transaction twice
    /// * `CourseTransactionNotFound` / `AlreadyRefunded` - bad refund target
    /// * `InsufficientBalance` - a solvency guard would be violated
    /// * `ArithmeticOverflow` - a balance would overflow
    pub fn commit(&self, unit: UnitOfWork) -> Result<CommitReceipt, LedgerError> {
        let operation = unit.operation();

        // Phase 1: resolve and lock every wallet the unit touches
        let wallet_ids = self.wallets_touched_by(&unit)?;
        let locks: Vec<Arc<Mutex<()>>> = wallet_ids
            .iter()
            .map(|&wallet_id| self.wallet_lock(wallet_id))
            .collect();
        let _guards: Vec<MutexGuard<'_, ()>> = locks
            .iter()
            .map(|lock| lock.lock().unwrap_or_else(PoisonError::into_inner))
            .collect();

        // Phase 2: validate against current state, computing final records
        let now = self.now();
        let mut deltas: HashMap<WalletId, Decimal> = HashMap::new();
        let mut solvency_guards: Vec<WalletId> = Vec::new();
        let mut staged_ids: HashSet<TransactionId> = HashSet::new();
        let mut planned: Vec<WalletTransaction> = Vec::new();
        let mut planned_courses: Vec<CourseTransaction> = Vec::new();

        for op in unit.ops() {
            match op {
                WriteOp::Insert(tx) => {
                    if !staged_ids.insert(tx.id) || self.transactions.contains_key(&tx.id) {
                        return Err(LedgerError::invalid_input(
                            "transaction",
                            format!("transaction {} already exists", tx.id),
                        ));
                    }
                    if tx.status == TransactionStatus::Completed {
                        add_delta(&mut deltas, tx.wallet_id, tx.amount, operation)?;
                    }
                    planned.push(tx.clone());
                }
                WriteOp::Settle { tx, outcome } => {
                    let current = self
                        .transactions
                        .get(tx)
                        .map(|entry| entry.value().clone())
                        .ok_or_else(|| LedgerError::transaction_not_found(*tx, operation))?;
                    if current.status != TransactionStatus::Pending {
                        return Err(LedgerError::invalid_state(*tx, current.status, operation));
                    }
                    if !staged_ids.insert(*tx) {
                        return Err(LedgerError::invalid_input(
                            "transaction",
                            format!("transaction {} staged twice", tx),
                        ));
                    }

                    let mut settled = current;
                    settled.processed_at = Some(now);
                    match outcome {
                        Settlement::Complete { amount } => {
                            settled.amount = amount.unwrap_or(settled.amount);
                            settled.status = TransactionStatus::Completed;
                            add_delta(&mut deltas, settled.wallet_id, settled.amount, operation)?;
                        }
                        Settlement::Fail { notes } => {
                            settled.status = TransactionStatus::Failed;
                            settled.notes = notes.clone();
                        }
                        Settlement::Cancel { notes } => {
                            settled.status = TransactionStatus::Cancelled;
                            settled.notes = notes.clone();
                        }
                    }
                    planned.push(settled);
                }
                WriteOp::InsertCourse(record) => {
                    if self.course_transactions.contains_key(&record.id) {
                        return Err(LedgerError::invalid_input(
                            "course transaction",
                            format!("course transaction {} already exists", record.id),
                        ));
                    }
                    planned_courses.push(record.clone());
                }
                WriteOp::MarkRefunded(id) => {
                    let mut record = self
                        .course_transactions
                        .get(id)
                        .map(|entry| entry.value().clone())
                        .ok_or_else(|| LedgerError::course_transaction_not_found(*id, operation))?;
                    if record.status == CourseTransactionStatus::Refunded
                        || planned_courses.iter().any(|planned| planned.id == *id)
                    {
                        return Err(LedgerError::AlreadyRefunded { id: *id });
                    }
                    record.status = CourseTransactionStatus::Refunded;
                    planned_courses.push(record);
                }
                WriteOp::RequireSolvent(wallet_id) => solvency_guards.push(*wallet_id),
            }
        }

        for wallet_id in solvency_guards {
            let wallet = self.wallet_by_id(wallet_id, operation)?;
            let delta = deltas.get(&wallet_id).copied().unwrap_or_default();
            let projected = wallet
                .balance
                .checked_add(delta)
                .ok_or_else(|| LedgerError::arithmetic_overflow(operation, wallet_id))?;
            if projected < Decimal::ZERO {
                return Err(LedgerError::insufficient_balance(
                    wallet.owner_id,
                    wallet.balance,
                    delta,
                ));
            }
        }

        for (&wallet_id, &delta) in &deltas {
            let wallet = self.wallet_by_id(wallet_id, operation)?;
            wallet
                .balance
                .checked_add(delta)
                .ok_or_else(|| LedgerError::arithmetic_overflow(operation, wallet_id))?;
        }

        // Phase 3: apply. Nothing below can fail.
        let mut receipt = CommitReceipt::default();
        {
            let _gate = self
                .commit_gate
                .write()
                .unwrap_or_else(PoisonError::into_inner);

            for tx in planned {
                self.transactions.insert(tx.id, tx.clone());
                receipt.transactions.push(tx);
            }
            for record in planned_courses {
                self.course_transactions.insert(record.id, record.clone());
                receipt.course_transactions.push(record);
            }
            let mut moved: Vec<WalletId> = deltas.keys().copied().collect();
            moved.sort_unstable();
            for wallet_id in moved {
                if let Some(wallet) = self.apply_balance_delta(wallet_id, deltas[&wallet_id]) {
                    receipt.wallets.push(wallet);
                }
            }
        }

        debug!(
            operation,
            writes = receipt.transactions.len() + receipt.course_transactions.len(),
            wallets = receipt.wallets.len(),
            "unit committed"
        );
        Ok(receipt)
    }

    /// Increment a wallet balance
    ///
    /// Only called from the apply phase of [`WalletStore::commit`], with the
    /// wallet lock and the commit gate held.
    fn apply_balance_delta(&self, wallet_id: WalletId, delta: Decimal) -> Option<Wallet> {
        let mut wallet = self.wallets.get_mut(&wallet_id)?;
        wallet.balance += delta;
        Some(wallet.value().clone())
    }

    fn wallets_touched_by(&self, unit: &UnitOfWork) -> Result<BTreeSet<WalletId>, LedgerError> {
        let mut wallet_ids = BTreeSet::new();
        for op in unit.ops() {
            match op {
                WriteOp::Insert(tx) => {
                    wallet_ids.insert(tx.wallet_id);
                }
                WriteOp::Settle { tx, .. } => {
                    // wallet_id never changes after insert, so it is safe to
                    // read before taking the lock
                    let wallet_id = self
                        .transactions
                        .get(tx)
                        .map(|entry| entry.wallet_id)
                        .ok_or_else(|| LedgerError::transaction_not_found(*tx, unit.operation()))?;
                    wallet_ids.insert(wallet_id);
                }
                WriteOp::MarkRefunded(id) => {
                    let owner_id = self
                        .course_transactions
                        .get(id)
                        .map(|entry| entry.owner_id)
                        .ok_or_else(|| {
                            LedgerError::course_transaction_not_found(*id, unit.operation())
                        })?;
                    if let Some(wallet_id) = self.owners.get(&owner_id).map(|id| *id) {
                        wallet_ids.insert(wallet_id);
                    }
                }
                WriteOp::RequireSolvent(wallet_id) => {
                    wallet_ids.insert(*wallet_id);
                }
                WriteOp::InsertCourse(_) => {}
            }
        }
        Ok(wallet_ids)
    }

    fn wallet_by_id(&self, wallet_id: WalletId, operation: &str) -> Result<Wallet, LedgerError> {
        self.wallets
            .get(&wallet_id)
            .map(|wallet| wallet.value().clone())
            .ok_or_else(|| {
                debug!(wallet_id, operation, "wallet missing at commit");
                LedgerError::wallet_id_not_found(wallet_id)
            })
    }

    fn wallet_lock(&self, wallet_id: WalletId) -> Arc<Mutex<()>> {
        self.wallet_locks.entry(wallet_id).or_default().clone()
    }

    fn read_gate(&self) -> RwLockReadGuard<'_, ()> {
        self.commit_gate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for WalletStore {
    fn default() -> Self {
        Self::new()
    }
}

fn add_delta(
    deltas: &mut HashMap<WalletId, Decimal>,
    wallet_id: WalletId,
    amount: Decimal,
    operation: &str,
) -> Result<(), LedgerError> {
    let entry = deltas.entry(wallet_id).or_default();
    *entry = entry
        .checked_add(amount)
        .ok_or_else(|| LedgerError::arithmetic_overflow(operation, wallet_id))?;
    Ok(())
}

/// Order transactions newest first, ties by descending id
pub(crate) fn sort_newest_first(transactions: &mut [WalletTransaction]) {
    transactions.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
