//! Synchronous replay strategy
//!
//! Reads the script row by row with [`SyncReader`] and runs each command on
//! the calling thread, in script order. Memory usage is bounded by the
//! ledger, not by the script.

use tracing::{info, warn};

use crate::io::sync_reader::SyncReader;
use crate::strategy::{CommandExecutor, ReplayStrategy, ReplaySummary};
use crate::types::LedgerError;
use std::path::Path;

/// Synchronous replay strategy
///
/// # Examples
///
/// ```no_run
/// use credit_wallet_ledger::core::{InMemoryDirectory, Ledger, LedgerConfig, WalletStore};
/// use credit_wallet_ledger::strategy::{CommandExecutor, ReplayStrategy, SyncReplayStrategy};
/// use credit_wallet_ledger::types::Actor;
/// use std::path::Path;
/// use std::sync::Arc;
///
/// let ledger = Ledger::new(
///     Arc::new(WalletStore::new()),
///     Arc::new(InMemoryDirectory::new()),
///     LedgerConfig::default(),
/// );
/// let executor = CommandExecutor::new(ledger, Actor::admin(0));
///
/// let summary = SyncReplayStrategy
///     .process(Path::new("commands.csv"), &executor)
///     .expect("replay failed");
/// println!("{} commands applied", summary.applied);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SyncReplayStrategy;

impl ReplayStrategy for SyncReplayStrategy {
    fn process(
        &self,
        input_path: &Path,
        executor: &CommandExecutor,
    ) -> Result<ReplaySummary, LedgerError> {
        let reader = SyncReader::new(input_path)?;
        let mut summary = ReplaySummary::default();

        for row in reader {
            match row {
                Ok(command) => summary.record(&executor.execute(command)),
                Err(e) => {
                    summary.malformed += 1;
                    warn!(error = %e, "skipping malformed script row");
                }
            }
        }

        info!(
            applied = summary.applied,
            rejected = summary.rejected,
            malformed = summary.malformed,
            "sync replay finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{InMemoryDirectory, Ledger, LedgerConfig, WalletStore};
    use crate::types::{Actor, ErrorKind};
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

    #[test]
    fn test_sync_replay_counts_outcomes() {
        let file = create_temp_csv(
            "submit,1,100,r1,,\n\
             approve,,,r1,,\n\
             approve,,,r1,,\n\
             not-a-command,1,1,,,\n\
             adjust,1,-30,,,correction\n",
        );
        let executor = executor();

        let summary = SyncReplayStrategy.process(file.path(), &executor).unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                applied: 3,
                rejected: 1,
                malformed: 1,
            }
        );
        let wallet = executor.ledger().store().wallet(1).unwrap();
        assert_eq!(wallet.balance, dec!(70));
    }

    #[test]
    fn test_sync_replay_missing_file() {
        let err = SyncReplayStrategy
            .process(Path::new("does/not/exist.csv"), &executor())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_sync_replay_empty_script() {
        let file = create_temp_csv("");
        let summary = SyncReplayStrategy.process(file.path(), &executor()).unwrap();
        assert_eq!(summary, ReplaySummary::default());
    }
}
