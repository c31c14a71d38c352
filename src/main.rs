//! Credit wallet ledger CLI
//!
//! Replays a command script into an in-memory credit ledger and writes one
//! report to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- commands.csv > wallets.csv
//! cargo run -- --strategy sync commands.csv > wallets.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 commands.csv
//! cargo run -- --report statistics --from 2024-01-01 --to 2024-01-31 commands.csv
//! cargo run -- --report export --type credit_purchase --status pending commands.csv
//! RUST_LOG=debug cargo run -- --verify commands.csv
//! ```
//!
//! Diagnostics go to stderr through `tracing`; the level is taken from
//! `RUST_LOG` and defaults to `warn`.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (file not found, unreadable script, failed verification, etc.)

use credit_wallet_ledger::cli;
use credit_wallet_ledger::core::{InMemoryDirectory, Ledger, LedgerConfig, WalletStore};
use credit_wallet_ledger::io::write_report;
use credit_wallet_ledger::strategy::{self, CommandExecutor};
use credit_wallet_ledger::types::LedgerError;
use std::process;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = cli::parse_args();

    if let Err(e) = run(&args) {
        error!(error = %e, "replay failed");
        process::exit(1);
    }
}

fn run(args: &cli::CliArgs) -> Result<(), LedgerError> {
    let strategy = {
        let config = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy, config)
    };

    let ledger = Ledger::new(
        Arc::new(WalletStore::new()),
        Arc::new(InMemoryDirectory::new()),
        LedgerConfig::default(),
    );
    let operator = args.operator();
    let executor = CommandExecutor::new(ledger.clone(), operator);

    let summary = strategy.process(&args.input_file, &executor)?;
    info!(
        applied = summary.applied,
        rejected = summary.rejected,
        malformed = summary.malformed,
        "script replayed"
    );

    if args.verify {
        let mismatches = ledger.reconcile(&operator)?;
        for mismatch in &mismatches {
            error!(
                wallet = mismatch.wallet_id,
                owner = mismatch.owner_id,
                stored = %mismatch.stored,
                computed = %mismatch.computed,
                "balance mismatch"
            );
        }
        if !mismatches.is_empty() {
            return Err(LedgerError::invalid_input(
                "ledger",
                format!("{} wallet balances do not match their history", mismatches.len()),
            ));
        }
    }

    let mut output = std::io::stdout().lock();
    write_report(&ledger, &operator, args.report, &args.to_filter(), &mut output)
}
