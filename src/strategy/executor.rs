//! Execution of script commands against the ledger
//!
//! This module provides the `CommandExecutor` struct, shared by both replay
//! strategies. It runs each [`LedgerCommand`] as the operator actor and keeps
//! the label table that lets later commands refer to records created earlier
//! in the script.
//!
//! # Labels
//!
//! `submit` and `adjust` bind their label to the new wallet transaction id;
//! `purchase` binds it to the new course transaction id. A reference that is
//! not a known label is passed on verbatim, so a raw numeric id works too and
//! an unknown name surfaces as the ledger's own not-found or malformed-id
//! handling.
//!
//! # Thread Safety
//!
//! The executor is cloneable and shares its label table, so the async
//! strategy can run commands of different owners on several tasks.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::core::Ledger;
use crate::types::{Actor, LedgerCommand, LedgerError};

/// Counters of one replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Commands the ledger accepted
    pub applied: usize,
    /// Commands the ledger refused (nothing was written for them)
    pub rejected: usize,
    /// Rows that could not be parsed into a command
    pub malformed: usize,
}

impl ReplaySummary {
    /// Count the outcome of one command
    pub fn record(&mut self, result: &Result<(), LedgerError>) {
        match result {
            Ok(()) => self.applied += 1,
            Err(_) => self.rejected += 1,
        }
    }

    pub fn merge(&mut self, other: ReplaySummary) {
        self.applied += other.applied;
        self.rejected += other.rejected;
        self.malformed += other.malformed;
    }
}

/// Runs script commands as one operator
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    ledger: Ledger,
    operator: Actor,
    labels: Arc<DashMap<String, u64>>,
}

impl CommandExecutor {
    pub fn new(ledger: Ledger, operator: Actor) -> Self {
        Self {
            ledger,
            operator,
            labels: Arc::new(DashMap::new()),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Run one command
    ///
    /// A refused command is logged and returned as an error; the ledger
    /// guarantees it wrote nothing.
    pub fn execute(&self, command: LedgerCommand) -> Result<(), LedgerError> {
        let op = command.op();
        self.dispatch(command)
            .inspect(|_| debug!(op, "command applied"))
            .inspect_err(|e| warn!(op, error = %e, "command rejected"))
    }

    fn dispatch(&self, command: LedgerCommand) -> Result<(), LedgerError> {
        let actor = &self.operator;
        match command {
            LedgerCommand::Submit {
                owner,
                amount,
                label,
                invoice_ref,
            } => {
                let tx = self.ledger.submit_request(actor, owner, amount, invoice_ref)?;
                self.bind(label, tx.id);
            }
            LedgerCommand::Approve { target, amount } => {
                let tx_id = self.resolve_id(&target)?;
                let amount = match amount {
                    Some(amount) => amount,
                    None => self.stored_amount(tx_id)?,
                };
                self.ledger.approve(actor, tx_id, amount)?;
            }
            LedgerCommand::Reject { target, reason } => {
                self.ledger.reject(actor, self.resolve_id(&target)?, reason)?;
            }
            LedgerCommand::Cancel { owner, target } => {
                self.ledger
                    .cancel_request(actor, owner, self.resolve_id(&target)?)?;
            }
            LedgerCommand::Adjust {
                owner,
                amount,
                reason,
                label,
            } => {
                let tx = self.ledger.adjust(actor, owner, amount, &reason)?;
                self.bind(label, tx.id);
            }
            LedgerCommand::BulkApprove { targets } => {
                self.ledger.bulk_approve(actor, &self.resolve_all(&targets))?;
            }
            LedgerCommand::BulkReject { targets, reason } => {
                self.ledger
                    .bulk_reject(actor, &self.resolve_all(&targets), reason)?;
            }
            LedgerCommand::Purchase {
                owner,
                course,
                price,
                label,
            } => {
                let purchase = self
                    .ledger
                    .record_course_purchase(actor, owner, course, price, None)?;
                self.bind(label, purchase.course_transaction.id);
            }
            LedgerCommand::Refund { target, reason } => {
                self.ledger
                    .record_refund(actor, self.resolve_id(&target)?, reason)?;
            }
        }
        Ok(())
    }

    /// Label or raw reference as the ledger should see it
    pub fn resolve(&self, reference: &str) -> String {
        self.labels
            .get(reference)
            .map(|id| id.value().to_string())
            .unwrap_or_else(|| reference.to_string())
    }

    fn resolve_all(&self, references: &[String]) -> Vec<String> {
        references.iter().map(|r| self.resolve(r)).collect()
    }

    fn resolve_id(&self, reference: &str) -> Result<u64, LedgerError> {
        self.resolve(reference).parse().map_err(|_| {
            LedgerError::invalid_input("ref", format!("unknown reference '{}'", reference))
        })
    }

    /// Requested amount of a request, for approvals without an amount
    fn stored_amount(&self, tx_id: u64) -> Result<rust_decimal::Decimal, LedgerError> {
        self.ledger
            .store()
            .transaction(tx_id)
            .map(|tx| tx.requested_amount.unwrap_or(tx.amount))
            .ok_or_else(|| LedgerError::transaction_not_found(tx_id, "approve"))
    }

    fn bind(&self, label: Option<String>, id: u64) {
        if let Some(label) = label {
            if let Some(previous) = self.labels.insert(label.clone(), id) {
                warn!(label = %label, previous, id, "label rebound");
            }
        }
    }
}
