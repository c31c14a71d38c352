//! End-to-end integration tests
//!
//! These tests replay the command scripts in tests/fixtures/ through the
//! public library API. The wallet-report fixtures:
//! 1. Replay input.csv into a fresh ledger
//! 2. Write the wallets report
//! 3. Compare it with expected.csv
//!
//! Each wallet fixture runs under both replay strategies. The statistics
//! and export checks run under the sync strategy, where transaction ids
//! follow script order.

#[cfg(test)]
mod tests {
    use credit_wallet_ledger::cli::{ReportKind, StrategyType};
    use credit_wallet_ledger::core::{InMemoryDirectory, Ledger, LedgerConfig, WalletStore};
    use credit_wallet_ledger::io::write_report;
    use credit_wallet_ledger::strategy::{create_strategy, BatchConfig, CommandExecutor, ReplaySummary};
    use credit_wallet_ledger::types::{Actor, TransactionFilter, TransactionStatus, TransactionType};
    use rstest::rstest;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use std::str::FromStr;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn fixture_path(fixture_name: &str, file: &str) -> String {
        let path = format!("tests/fixtures/{}/{}", fixture_name, file);
        assert!(Path::new(&path).exists(), "Fixture file not found: {}", path);
        path
    }

    /// Replay a fixture script into a fresh ledger
    fn replay(fixture_name: &str, strategy_type: StrategyType) -> (Ledger, ReplaySummary) {
        let ledger = Ledger::new(
            Arc::new(WalletStore::new()),
            Arc::new(InMemoryDirectory::new()),
            LedgerConfig::default(),
        );
        let executor = CommandExecutor::new(ledger.clone(), Actor::admin(0));
        // Small batches so the async strategy crosses batch boundaries
        let strategy = create_strategy(strategy_type, Some(BatchConfig::new(3, 4)));

        let summary = strategy
            .process(Path::new(&fixture_path(fixture_name, "input.csv")), &executor)
            .unwrap_or_else(|e| panic!("Failed to replay {}: {}", fixture_name, e));
        (ledger, summary)
    }

    fn report(ledger: &Ledger, kind: ReportKind, filter: &TransactionFilter) -> String {
        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");
        write_report(ledger, &Actor::admin(0), kind, filter, &mut temp_output)
            .unwrap_or_else(|e| panic!("Failed to write report: {}", e));
        temp_output.flush().expect("Failed to flush temp file");
        fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e))
    }

    fn decimal(value: &serde_json::Value) -> Decimal {
        let text = value.as_str().unwrap_or_else(|| panic!("not a decimal string: {}", value));
        Decimal::from_str(text).unwrap()
    }

    /// End-to-end test for all wallet fixtures with both replay strategies
    #[rstest]
    #[case("request_lifecycle")]
    #[case("course_purchases")]
    #[case("bulk_operations")]
    #[case("adjustments_and_overdraft")]
    #[case("malformed_data")]
    #[case("verify_clean")]
    fn test_fixtures(
        #[case] fixture: &str,
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        let (ledger, _summary) = replay(fixture, strategy);

        let actual_output = report(&ledger, ReportKind::Wallets, &TransactionFilter::default());
        let expected_path = fixture_path(fixture, "expected.csv");
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (strategy: {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture, strategy, actual_output, expected_output
        );
        assert!(
            ledger.store().reconcile().is_empty(),
            "balances drifted from history for fixture {}",
            fixture
        );
    }

    #[rstest]
    #[case::lifecycle("request_lifecycle", 8, 2, 0)]
    #[case::courses("course_purchases", 6, 2, 1)]
    #[case::bulk("bulk_operations", 9, 1, 0)]
    #[case::malformed("malformed_data", 2, 3, 4)]
    fn test_replay_summary_is_strategy_independent(
        #[case] fixture: &str,
        #[case] applied: usize,
        #[case] rejected: usize,
        #[case] malformed: usize,
    ) {
        let expected = ReplaySummary {
            applied,
            rejected,
            malformed,
        };
        assert_eq!(replay(fixture, StrategyType::Sync).1, expected);
        assert_eq!(replay(fixture, StrategyType::Async).1, expected);
    }

    #[test]
    fn test_statistics_report() {
        let (ledger, _) = replay("course_purchases", StrategyType::Sync);

        let output = report(&ledger, ReportKind::Statistics, &TransactionFilter::default());
        let stats: serde_json::Value = serde_json::from_str(&output).unwrap();

        let totals = stats["totals"].as_array().unwrap();
        assert_eq!(totals.len(), 4);
        let course = totals
            .iter()
            .find(|t| t["tx_type"] == "COURSE_PURCHASE")
            .unwrap();
        assert_eq!(decimal(&course["total"]), dec!(190));
        assert_eq!(course["count"], 3);
        let credit = totals
            .iter()
            .find(|t| t["tx_type"] == "CREDIT_PURCHASE")
            .unwrap();
        assert_eq!(credit["count"], 0);

        assert_eq!(stats["completed_count"], 6);
        assert_eq!(decimal(&stats["average_amount"]), dec!(83.33));
        assert_eq!(stats["pending_count"], 0);
        assert_eq!(stats["top_wallets"][0]["owner_id"], 1);
        assert_eq!(stats["top_wallets"][0]["transaction_count"], 4);
    }

    #[test]
    fn test_export_report() {
        let (ledger, _) = replay("request_lifecycle", StrategyType::Sync);
        let filter = TransactionFilter::new()
            .with_type(TransactionType::CreditPurchase)
            .with_status(TransactionStatus::Completed);

        let output = report(&ledger, ReportKind::Export, &filter);
        let mut reader = csv::Reader::from_reader(output.as_bytes());
        let headers = reader.headers().unwrap().clone();
        let rows: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();

        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["id", "user", "type", "amount", "status", "date", "course", "notes"]
        );
        // Newest first
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "3");
        assert_eq!(Decimal::from_str(&rows[0][3]).unwrap(), dec!(120));
        assert_eq!(&rows[1][0], "1");
        assert_eq!(&rows[1][4], "COMPLETED");
    }

    #[test]
    fn test_empty_export_still_has_header() {
        let (ledger, _) = replay("malformed_data", StrategyType::Sync);
        let filter = TransactionFilter::new().with_type(TransactionType::Refund);

        let output = report(&ledger, ReportKind::Export, &filter);

        assert_eq!(output, "id,user,type,amount,status,date,course,notes\n");
    }

    #[test]
    fn test_wallet_report_for_one_owner() {
        let (ledger, _) = replay("bulk_operations", StrategyType::Async);
        let filter = TransactionFilter::new().with_owner(3);

        let output = report(&ledger, ReportKind::Wallets, &filter);

        assert_eq!(output, "owner,balance\n3,30.00\n");
    }
}
