//! CSV format handling for command scripts and reports
//!
//! This module centralizes all format concerns, providing:
//! - CommandRecord structure for deserializing script rows
//! - Conversion from script rows to ledger commands
//! - Wallet, export and statistics report serialization
//!
//! All functions are pure (no file handling) for easy testing.

use std::io::Write;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::core::{ExportRow, LedgerStatistics};
use crate::types::{CourseId, LedgerCommand, LedgerError, OwnerId, Wallet, LIST_SEPARATOR};

/// Header of the export report
pub const EXPORT_HEADER: [&str; 8] = [
    "id", "user", "type", "amount", "status", "date", "course", "notes",
];

/// One row of a command script
///
/// Matches the script columns: op, owner, amount, ref, course, note.
/// Every column but `op` is optional; which ones a row needs depends on the
/// operation.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct CommandRecord {
    pub op: String,
    pub owner: Option<OwnerId>,
    pub amount: Option<String>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub course: Option<CourseId>,
    pub note: Option<String>,
}

/// Convert a script row into a ledger command
///
/// This function:
/// - Parses the operation name (case-insensitive)
/// - Parses the amount into a Decimal when present
/// - Checks that the columns the operation needs are present
///
/// Amount signs and ranges are not checked here; the ledger rejects them
/// with its own errors.
///
/// # Returns
///
/// * `Ok(LedgerCommand)` - Successfully converted command
/// * `Err(LedgerError::ParseError)` - Unknown operation or missing column
pub fn convert_command_record(record: CommandRecord) -> Result<LedgerCommand, LedgerError> {
    let op = record.op.trim().to_lowercase();
    let amount = parse_amount(record.amount.as_deref(), &op)?;
    let reference = non_blank(record.reference);
    let note = non_blank(record.note);

    let command = match op.as_str() {
        "submit" => LedgerCommand::Submit {
            owner: require(record.owner, "owner", &op)?,
            amount: require(amount, "amount", &op)?,
            label: reference,
            invoice_ref: note,
        },
        "approve" => LedgerCommand::Approve {
            target: require(reference, "ref", &op)?,
            amount,
        },
        "reject" => LedgerCommand::Reject {
            target: require(reference, "ref", &op)?,
            reason: note,
        },
        "cancel" => LedgerCommand::Cancel {
            owner: require(record.owner, "owner", &op)?,
            target: require(reference, "ref", &op)?,
        },
        "adjust" => LedgerCommand::Adjust {
            owner: require(record.owner, "owner", &op)?,
            amount: require(amount, "amount", &op)?,
            reason: note.unwrap_or_default(),
            label: reference,
        },
        "bulk_approve" => LedgerCommand::BulkApprove {
            targets: split_list(&require(reference, "ref", &op)?),
        },
        "bulk_reject" => LedgerCommand::BulkReject {
            targets: split_list(&require(reference, "ref", &op)?),
            reason: note,
        },
        "purchase" => LedgerCommand::Purchase {
            owner: require(record.owner, "owner", &op)?,
            course: require(record.course, "course", &op)?,
            price: require(amount, "amount", &op)?,
            label: reference,
        },
        "refund" => LedgerCommand::Refund {
            target: require(reference, "ref", &op)?,
            reason: note,
        },
        _ => return Err(parse_error(format!("Unknown operation '{}'", record.op))),
    };

    Ok(command)
}

fn parse_amount(amount: Option<&str>, op: &str) -> Result<Option<Decimal>, LedgerError> {
    match amount.map(str::trim) {
        Some(text) if !text.is_empty() => Decimal::from_str(text)
            .map(Some)
            .map_err(|_| parse_error(format!("Invalid amount '{}' for {}", text, op))),
        _ => Ok(None),
    }
}

fn require<T>(value: Option<T>, column: &str, op: &str) -> Result<T, LedgerError> {
    value.ok_or_else(|| parse_error(format!("{} requires a value in '{}'", op, column)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split a `;`-separated id list, keeping blank entries out
pub fn split_list(list: &str) -> Vec<String> {
    list.split(LIST_SEPARATOR)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_error(message: String) -> LedgerError {
    LedgerError::ParseError {
        line: None,
        message,
    }
}

/// Write wallet balances to CSV format
///
/// Writes wallets with columns: owner, balance.
/// Wallets are sorted by owner id for deterministic output.
pub fn write_wallets_csv(wallets: &[Wallet], output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(["owner", "balance"])?;

    let mut sorted = wallets.to_vec();
    sorted.sort_by_key(|wallet| wallet.owner_id);

    for wallet in sorted {
        writer.write_record(&[wallet.owner_id.to_string(), format!("{:.2}", wallet.balance)])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write export rows to CSV format
///
/// The header is always written, so an empty export is still a valid file.
pub fn write_export_csv(rows: &[ExportRow], output: &mut dyn Write) -> Result<(), LedgerError> {
    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(EXPORT_HEADER)?;

    for row in rows {
        writer.write_record(&[
            row.id.to_string(),
            row.user.clone(),
            row.tx_type.clone(),
            row.amount.clone(),
            row.status.clone(),
            row.date.clone(),
            row.course.clone(),
            row.notes.clone(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write statistics as pretty-printed JSON
pub fn write_statistics_json(
    statistics: &LedgerStatistics,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    serde_json::to_writer_pretty(&mut *output, statistics)?;
    writeln!(output)?;
    Ok(())
}
