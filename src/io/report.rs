//! Report selection for the command-line tool
//!
//! After a script has been replayed, exactly one report is written to the
//! output: wallet balances, statistics, or a transaction export.

use std::io::Write;

use crate::cli::ReportKind;
use crate::core::Ledger;
use crate::io::csv_format::{write_export_csv, write_statistics_json, write_wallets_csv};
use crate::types::{Actor, LedgerError, TransactionFilter};

/// Write the selected report for `ledger`
///
/// # Arguments
///
/// * `ledger` - Ledger the script was replayed into
/// * `operator` - Actor the report is produced for
/// * `report` - Which report to write
/// * `filter` - Selection for the export; its date range bounds statistics
///   and its owner restricts the wallet report
/// * `output` - Destination of the report
pub fn write_report(
    ledger: &Ledger,
    operator: &Actor,
    report: ReportKind,
    filter: &TransactionFilter,
    output: &mut dyn Write,
) -> Result<(), LedgerError> {
    match report {
        ReportKind::Wallets => {
            let mut wallets = ledger.wallets(operator)?;
            if let Some(owner_id) = filter.owner_id {
                wallets.retain(|wallet| wallet.owner_id == owner_id);
            }
            write_wallets_csv(&wallets, output)
        }
        ReportKind::Statistics => {
            let statistics = ledger.get_statistics(operator, filter.date_range())?;
            write_statistics_json(&statistics, output)
        }
        ReportKind::Export => {
            let rows = ledger.export(operator, filter)?;
            write_export_csv(&rows, output)
        }
    }
}
