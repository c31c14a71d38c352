//! Asynchronous batch replay strategy
//!
//! Reads the script in batches and runs each batch through a
//! [`CommandBatchProcessor`], which spreads owner-scoped commands of
//! different owners over the worker threads.
//!
//! # Architecture
//!
//! ```text
//! AsyncReplayStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     └── CommandBatchProcessor (barrier segments + owner partitioning)
//!         └── CommandExecutor (shared ledger and label table)
//! ```
//!
//! Batches run one after another, so an owner's commands keep their script
//! order across batch boundaries.

use tracing::{info, warn};

use crate::io::async_reader::AsyncReader;
use crate::io::sync_reader::open_error;
use crate::strategy::batch::{summarize, CommandBatchProcessor};
use crate::strategy::{CommandExecutor, ReplayStrategy, ReplaySummary};
use crate::types::LedgerError;
use std::path::Path;

/// Configuration for batch processing
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Number of commands per batch
    pub batch_size: usize,
    /// Number of worker threads
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig; zero values fall back to the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                requested = batch_size,
                fallback = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                requested = max_concurrent_batches,
                fallback = default.max_concurrent_batches,
                "invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch replay strategy
#[derive(Debug, Clone)]
pub struct AsyncReplayStrategy {
    config: BatchConfig,
}

impl AsyncReplayStrategy {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }
}

impl ReplayStrategy for AsyncReplayStrategy {
    fn process(
        &self,
        input_path: &Path,
        executor: &CommandExecutor,
    ) -> Result<ReplaySummary, LedgerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| LedgerError::IoError {
                message: format!("Failed to create tokio runtime: {}", e),
            })?;

        runtime.block_on(async {
            let processor = CommandBatchProcessor::new(executor.clone());

            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| open_error(input_path, e))?;
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut summary = ReplaySummary::default();
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                let results = processor.process_batch(batch).await;
                summary.merge(summarize(&results));
            }
            summary.malformed = reader.malformed();

            info!(
                applied = summary.applied,
                rejected = summary.rejected,
                malformed = summary.malformed,
                "async replay finished"
            );
            Ok(summary)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{InMemoryDirectory, Ledger, LedgerConfig, WalletStore};
    use crate::strategy::SyncReplayStrategy;
    use crate::types::{Actor, ErrorKind};
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    const HEADER: &str = "op,owner,amount,ref,course,note\n";

    fn create_temp_csv(rows: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(format!("{}{}", HEADER, rows).as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn executor() -> CommandExecutor {
        let ledger = Ledger::new(
            Arc::new(WalletStore::new()),
            Arc::new(InMemoryDirectory::new()),
            LedgerConfig::default(),
        );
        CommandExecutor::new(ledger, Actor::admin(0))
    }

    fn balances(executor: &CommandExecutor) -> Vec<(u32, rust_decimal::Decimal)> {
        executor
            .ledger()
            .store()
            .all_wallets()
            .into_iter()
            .map(|w| (w.owner_id, w.balance))
            .collect()
    }

    const SCRIPT: &str = "submit,1,100,r1,,\n\
                          submit,2,40,r2,,\n\
                          adjust,3,25,,,grant\n\
                          approve,,,r1,,\n\
                          bulk_approve,,,r2;ghost,,\n\
                          purchase,1,30,c1,9,\n\
                          purchase,2,50,c2,9,\n\
                          adjust,3,-5,,,fee\n\
                          refund,,,c1,,\n\
                          submit,3,10,r3,,\n\
                          cancel,3,,r3,,\n\
                          broken,row\n";

    #[rstest]
    #[case::single_batch(1000, 4)]
    #[case::tiny_batches(1, 2)]
    #[case::odd_batches(3, 8)]
    fn test_async_matches_sync(#[case] batch_size: usize, #[case] workers: usize) {
        let file = create_temp_csv(SCRIPT);

        let sync_executor = executor();
        let sync_summary = SyncReplayStrategy
            .process(file.path(), &sync_executor)
            .unwrap();

        let async_executor = executor();
        let strategy = AsyncReplayStrategy::new(BatchConfig::new(batch_size, workers));
        let async_summary = strategy.process(file.path(), &async_executor).unwrap();

        assert_eq!(async_summary, sync_summary);
        assert_eq!(balances(&async_executor), balances(&sync_executor));
        assert_eq!(
            balances(&async_executor),
            vec![(1, dec!(100)), (2, dec!(40)), (3, dec!(20))]
        );
        assert_eq!(async_summary.malformed, 1);
        assert_eq!(async_summary.rejected, 1);
    }

    #[test]
    fn test_async_missing_file() {
        let strategy = AsyncReplayStrategy::new(BatchConfig::default());
        let err = strategy
            .process(Path::new("does/not/exist.csv"), &executor())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_batch_config_zero_falls_back() {
        let config = BatchConfig::new(0, 0);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.max_concurrent_batches, num_cpus::get());
    }
}
