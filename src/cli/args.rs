use crate::strategy::BatchConfig;
use crate::types::{Actor, OwnerId, TransactionFilter, TransactionStatus, TransactionType};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay a credit wallet command script and report the resulting ledger
#[derive(Parser, Debug)]
#[command(name = "credit-ledger")]
#[command(about = "Replay credit wallet commands and report the resulting ledger", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing the command script
    #[arg(value_name = "INPUT", help = "Path to the command script CSV file")]
    pub input_file: PathBuf,

    /// Replay strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Replay strategy: 'sync' for sequential or 'async' for owner-parallel batches"
    )]
    pub strategy: StrategyType,

    /// Number of commands per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Maximum number of worker threads (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of worker threads (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Report written to stdout after the replay
    #[arg(long = "report", value_name = "REPORT", default_value = "wallets")]
    pub report: ReportKind,

    /// Only transactions of this type (export)
    #[arg(long = "type", value_name = "TYPE")]
    pub tx_type: Option<TransactionType>,

    /// Only transactions in this status (export)
    #[arg(long = "status", value_name = "STATUS")]
    pub status: Option<TransactionStatus>,

    /// Only this owner (wallets, export)
    #[arg(long = "owner", value_name = "OWNER")]
    pub owner: Option<OwnerId>,

    /// Window start, YYYY-MM-DD or RFC 3339 (statistics, export)
    #[arg(long = "from", value_name = "DATE", value_parser = parse_window_start)]
    pub from: Option<DateTime<Utc>>,

    /// Window end, inclusive; YYYY-MM-DD covers the whole day
    #[arg(long = "to", value_name = "DATE", value_parser = parse_window_end)]
    pub to: Option<DateTime<Utc>>,

    /// Id of the administrator the script is replayed as
    #[arg(long = "operator", value_name = "ID", default_value_t = 0)]
    pub operator: OwnerId,

    /// Recompute every balance after the replay and fail on a mismatch
    #[arg(long = "verify")]
    pub verify: bool,
}

/// Available replay strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

/// Reports the tool can write
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// Balance per owner, CSV
    Wallets,
    /// Aggregates over completed transactions, JSON
    Statistics,
    /// One row per matching transaction, CSV
    Export,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values fall back to the defaults; zero values are replaced by
    /// the defaults with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Transaction selection described by the filter flags
    pub fn to_filter(&self) -> TransactionFilter {
        TransactionFilter {
            tx_type: self.tx_type,
            status: self.status,
            owner_id: self.owner,
            start_date: self.from,
            end_date: self.to,
        }
    }

    /// The elevated actor the script is replayed as
    pub fn operator(&self) -> Actor {
        Actor::admin(self.operator)
    }
}

fn parse_window_start(value: &str) -> Result<DateTime<Utc>, String> {
    let start_of_day =
        NaiveTime::from_hms_opt(0, 0, 0).ok_or_else(|| "invalid start of day".to_string())?;
    parse_window_bound(value, start_of_day)
}

fn parse_window_end(value: &str) -> Result<DateTime<Utc>, String> {
    let end_of_day = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
        .ok_or_else(|| "invalid end of day".to_string())?;
    parse_window_bound(value, end_of_day)
}

/// Parse an RFC 3339 instant, or a calendar date at `time_of_day` UTC
fn parse_window_bound(value: &str, time_of_day: NaiveTime) -> Result<DateTime<Utc>, String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(time_of_day).and_utc())
        .map_err(|_| format!("'{}' is neither YYYY-MM-DD nor an RFC 3339 timestamp", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    // Strategy parsing tests
    #[rstest]
    #[case::default_strategy(&["program", "input.csv"], StrategyType::Async)]
    #[case::explicit_sync(&["program", "--strategy", "sync", "input.csv"], StrategyType::Sync)]
    #[case::explicit_async(&["program", "--strategy", "async", "input.csv"], StrategyType::Async)]
    fn test_strategy_parsing(#[case] args: &[&str], #[case] expected: StrategyType) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.strategy, expected);
    }

    #[rstest]
    #[case::default_report(&["program", "input.csv"], ReportKind::Wallets)]
    #[case::statistics(&["program", "--report", "statistics", "input.csv"], ReportKind::Statistics)]
    #[case::export(&["program", "--report", "export", "input.csv"], ReportKind::Export)]
    fn test_report_parsing(#[case] args: &[&str], #[case] expected: ReportKind) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.report, expected);
    }

    // BatchConfig conversion tests
    #[rstest]
    #[case::all_defaults(&["program", "input.csv"], 1000, num_cpus::get())]
    #[case::custom_batch_size(&["program", "--batch-size", "2000", "input.csv"], 2000, num_cpus::get())]
    #[case::custom_max_concurrent(&["program", "--max-concurrent", "8", "input.csv"], 1000, 8)]
    #[case::zero_batch_size(&["program", "--batch-size", "0", "input.csv"], 1000, num_cpus::get())]
    #[case::zero_max_concurrent(&["program", "--max-concurrent", "0", "input.csv"], 1000, num_cpus::get())]
    fn test_batch_config_conversion(
        #[case] args: &[&str],
        #[case] expected_batch_size: usize,
        #[case] expected_max_concurrent: usize,
    ) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        let config = parsed.to_batch_config();

        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_max_concurrent);
    }

    #[test]
    fn test_filter_flags() {
        let parsed = CliArgs::try_parse_from([
            "program",
            "--type",
            "course_purchase",
            "--status",
            "completed",
            "--owner",
            "7",
            "--from",
            "2024-01-01",
            "--to",
            "2024-01-31",
            "input.csv",
        ])
        .unwrap();

        let filter = parsed.to_filter();

        assert_eq!(filter.tx_type, Some(TransactionType::CoursePurchase));
        assert_eq!(filter.status, Some(TransactionStatus::Completed));
        assert_eq!(filter.owner_id, Some(7));
        assert_eq!(filter.start_date, Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let end = filter.end_date.unwrap();
        assert_eq!(end.to_rfc3339(), "2024-01-31T23:59:59.999999999+00:00");
    }

    #[test]
    fn test_date_only_end_covers_last_nanosecond_of_day() {
        let parsed = CliArgs::try_parse_from(["program", "--to", "2024-01-31", "input.csv"]).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap()
            + chrono::Duration::nanoseconds(999_500_000);
        let next_day = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        let range = parsed.to_filter().date_range();

        assert!(range.contains(late));
        assert!(!range.contains(next_day));
    }

    #[test]
    fn test_rfc3339_window_bound() {
        let parsed = CliArgs::try_parse_from([
            "program",
            "--from",
            "2024-02-01T10:00:00+02:00",
            "input.csv",
        ])
        .unwrap();
        assert_eq!(parsed.from, Some(Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap()));
    }

    #[test]
    fn test_operator_defaults_to_admin_zero() {
        let parsed = CliArgs::try_parse_from(["program", "input.csv"]).unwrap();
        assert_eq!(parsed.operator(), Actor::admin(0));
        assert!(!parsed.verify);
    }

    // Error handling tests
    #[rstest]
    #[case::missing_input(&["program"])]
    #[case::invalid_strategy(&["program", "--strategy", "invalid", "input.csv"])]
    #[case::invalid_report(&["program", "--report", "ledger", "input.csv"])]
    #[case::invalid_type(&["program", "--type", "gift", "input.csv"])]
    #[case::invalid_date(&["program", "--from", "yesterday", "input.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        let result = CliArgs::try_parse_from(args);
        assert!(result.is_err());
    }
}
