//! Staged writes committed to the wallet store as one atomic unit
//!
//! Writers never mutate the store directly. They describe what should happen
//! in a [`UnitOfWork`] and hand it to [`super::WalletStore::commit`], which
//! validates every staged write before applying any of them.
//!
//! Balance changes are not staged explicitly: the store derives them from the
//! status writes (inserting a COMPLETED transaction, or completing a PENDING
//! one). A unit therefore cannot complete a transaction without crediting
//! its wallet, or credit a wallet without a completed transaction.

use rust_decimal::Decimal;

use crate::types::{
    CourseTransaction, CourseTransactionId, TransactionId, WalletId, WalletTransaction,
};

/// Terminal state a PENDING transaction is moved to
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// COMPLETED, crediting `amount` (or the stored requested amount when
    /// `None`) to the wallet
    Complete { amount: Option<Decimal> },
    /// FAILED, no balance effect
    Fail { notes: Option<String> },
    /// CANCELLED, no balance effect
    Cancel { notes: Option<String> },
}

/// A single staged write
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Append a new transaction; a COMPLETED one moves its wallet balance
    Insert(WalletTransaction),
    /// Move a PENDING transaction to a terminal status
    Settle {
        tx: TransactionId,
        outcome: Settlement,
    },
    /// Append a settled course purchase record
    InsertCourse(CourseTransaction),
    /// Flag a course purchase as refunded
    MarkRefunded(CourseTransactionId),
    /// Abort the unit if the wallet's projected balance would be negative
    RequireSolvent(WalletId),
}

/// An ordered set of writes that commit together or not at all
#[derive(Debug, Clone, PartialEq)]
pub struct UnitOfWork {
    operation: &'static str,
    ops: Vec<WriteOp>,
}

impl UnitOfWork {
    /// Start an empty unit; `operation` names it in errors and logs
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            ops: Vec::new(),
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn insert_transaction(&mut self, tx: WalletTransaction) -> &mut Self {
        self.ops.push(WriteOp::Insert(tx));
        self
    }

    pub fn complete(&mut self, tx: TransactionId, amount: Option<Decimal>) -> &mut Self {
        self.ops.push(WriteOp::Settle {
            tx,
            outcome: Settlement::Complete { amount },
        });
        self
    }

    pub fn fail(&mut self, tx: TransactionId, notes: Option<String>) -> &mut Self {
        self.ops.push(WriteOp::Settle {
            tx,
            outcome: Settlement::Fail { notes },
        });
        self
    }

    pub fn cancel(&mut self, tx: TransactionId, notes: Option<String>) -> &mut Self {
        self.ops.push(WriteOp::Settle {
            tx,
            outcome: Settlement::Cancel { notes },
        });
        self
    }

    pub fn insert_course_transaction(&mut self, record: CourseTransaction) -> &mut Self {
        self.ops.push(WriteOp::InsertCourse(record));
        self
    }

    pub fn mark_refunded(&mut self, id: CourseTransactionId) -> &mut Self {
        self.ops.push(WriteOp::MarkRefunded(id));
        self
    }

    pub fn require_solvent(&mut self, wallet: WalletId) -> &mut Self {
        self.ops.push(WriteOp::RequireSolvent(wallet));
        self
    }
}
