//! Replay strategy module
//!
//! This module defines the Strategy pattern for replaying a command script
//! into a ledger. Both strategies read the same script format and run every
//! command through a [`CommandExecutor`]; they differ only in scheduling, so
//! the resulting balances are the same whichever one is selected at runtime.

use crate::cli::StrategyType;
use crate::types::LedgerError;
use std::path::Path;

pub mod r#async;
pub mod batch;
pub mod executor;
pub mod sync;

pub use self::r#async::{AsyncReplayStrategy, BatchConfig};
pub use batch::CommandBatchProcessor;
pub use executor::{CommandExecutor, ReplaySummary};
pub use sync::SyncReplayStrategy;

/// Replay strategy trait
pub trait ReplayStrategy: Send + Sync {
    /// Replay the script at `input_path` through `executor`
    ///
    /// # Returns
    ///
    /// * `Ok(ReplaySummary)` once every row was read, whether or not the
    ///   ledger accepted each command
    /// * `Err(LedgerError)` if a fatal error occurred (file not found, I/O
    ///   error, runtime failure)
    ///
    /// Malformed rows and refused commands are logged and counted; they never
    /// stop the replay.
    fn process(
        &self,
        input_path: &Path,
        executor: &CommandExecutor,
    ) -> Result<ReplaySummary, LedgerError>;
}

/// Create a replay strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - The type of replay strategy to create (Sync or Async)
/// * `config` - Optional configuration for async batch processing (ignored for sync)
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
) -> Box<dyn ReplayStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncReplayStrategy),
        StrategyType::Async => Box::new(AsyncReplayStrategy::new(config.unwrap_or_default())),
    }
}
