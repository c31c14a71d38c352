//! Transaction filters shared by listings, statistics and exports

use chrono::{DateTime, Utc};

use super::error::LedgerError;
use super::transaction::{TransactionStatus, TransactionType, WalletTransaction};
use super::wallet::OwnerId;

/// Inclusive creation-time window
///
/// A missing bound leaves that side of the window open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        DateRange { start, end }
    }

    /// Reject windows whose start lies after their end
    pub fn validate(&self) -> Result<(), LedgerError> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start > end => Err(LedgerError::invalid_input(
                "date range",
                format!("start {} is after end {}", start.to_rfc3339(), end.to_rfc3339()),
            )),
            _ => Ok(()),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| at >= start) && self.end.is_none_or(|end| at <= end)
    }
}

/// Selection of ledger transactions
///
/// Every field is optional; an unset field does not restrict the selection.
/// The same filter drives `list_transactions` and `export`, so both always
/// agree on which rows match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// Only transactions of this type
    pub tx_type: Option<TransactionType>,
    /// Only transactions currently in this status
    pub status: Option<TransactionStatus>,
    /// Only transactions of this owner's wallet
    pub owner_id: Option<OwnerId>,
    /// Only transactions created at or after this instant
    pub start_date: Option<DateTime<Utc>>,
    /// Only transactions created at or before this instant
    pub end_date: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, tx_type: TransactionType) -> Self {
        self.tx_type = Some(tx_type);
        self
    }

    pub fn with_status(mut self, status: TransactionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_owner(mut self, owner_id: OwnerId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn between(
        mut self,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
    ) -> Self {
        self.start_date = start_date;
        self.end_date = end_date;
        self
    }

    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        self.date_range().validate()
    }

    pub fn matches(&self, tx: &WalletTransaction) -> bool {
        self.tx_type.is_none_or(|t| tx.tx_type == t)
            && self.status.is_none_or(|s| tx.status == s)
            && self.owner_id.is_none_or(|o| tx.owner_id == o)
            && self.date_range().contains(tx.created_at)
    }
}

/// Offset/limit window over a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Page { offset, limit }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page {
            offset: 0,
            limit: 50,
        }
    }
}
