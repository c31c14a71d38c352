//! Commands replayed by the command-line tool
//!
//! A command script is a CSV file whose rows map onto [`LedgerCommand`]s.
//! Commands that create a record may name it with a label; later commands
//! refer to records by label (or by raw id).

use rust_decimal::Decimal;

use super::transaction::CourseId;
use super::wallet::OwnerId;

/// Separator of the id list in bulk commands
pub const LIST_SEPARATOR: char = ';';

/// One ledger operation from a command script
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerCommand {
    /// Request a credit purchase
    Submit {
        owner: OwnerId,
        amount: Decimal,
        label: Option<String>,
        invoice_ref: Option<String>,
    },
    /// Approve a request; `None` credits the requested amount
    Approve {
        target: String,
        amount: Option<Decimal>,
    },
    Reject {
        target: String,
        reason: Option<String>,
    },
    /// Owner withdraws their own request
    Cancel { owner: OwnerId, target: String },
    Adjust {
        owner: OwnerId,
        amount: Decimal,
        reason: String,
        label: Option<String>,
    },
    BulkApprove { targets: Vec<String> },
    BulkReject {
        targets: Vec<String>,
        reason: Option<String>,
    },
    /// Buy a course; the label names the course transaction
    Purchase {
        owner: OwnerId,
        course: CourseId,
        price: Decimal,
        label: Option<String>,
    },
    /// Refund a course transaction
    Refund {
        target: String,
        reason: Option<String>,
    },
}

impl LedgerCommand {
    /// Script name of the command
    pub fn op(&self) -> &'static str {
        match self {
            LedgerCommand::Submit { .. } => "submit",
            LedgerCommand::Approve { .. } => "approve",
            LedgerCommand::Reject { .. } => "reject",
            LedgerCommand::Cancel { .. } => "cancel",
            LedgerCommand::Adjust { .. } => "adjust",
            LedgerCommand::BulkApprove { .. } => "bulk_approve",
            LedgerCommand::BulkReject { .. } => "bulk_reject",
            LedgerCommand::Purchase { .. } => "purchase",
            LedgerCommand::Refund { .. } => "refund",
        }
    }

    /// The single owner this command acts on, if it is confined to one
    ///
    /// Commands with an owner scope only read and write that owner's wallet,
    /// so commands of different owners may run concurrently. Every other
    /// command must run alone, in script order.
    pub fn owner_scope(&self) -> Option<OwnerId> {
        match self {
            LedgerCommand::Submit { owner, .. }
            | LedgerCommand::Cancel { owner, .. }
            | LedgerCommand::Adjust { owner, .. }
            | LedgerCommand::Purchase { owner, .. } => Some(*owner),
            _ => None,
        }
    }
}
