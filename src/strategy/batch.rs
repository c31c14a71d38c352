//! Batch processing with owner-based partitioning for the async replay
//!
//! This module provides the `CommandBatchProcessor` struct, which runs a batch
//! of script commands with as much concurrency as their ordering allows.
//!
//! # Design
//!
//! A batch is cut into segments at every command without an owner scope
//! (approvals, rejections, bulk calls, refunds). Those commands refer to
//! records by label, so they run alone and only after everything before
//! them has finished:
//!
//! ```text
//! submit(1) submit(2) adjust(1) │ approve(r1) │ submit(3) purchase(2)
//! └──── owner-parallel ───────┘   barrier       └── owner-parallel ──┘
//! ```
//!
//! Within a segment, commands are partitioned by owner. Each owner's commands
//! run sequentially in script order on their own tokio task, while different
//! owners run concurrently. An owner-scoped command only reads and writes its
//! owner's wallet, so the final balances match a sequential replay.
//!
//! # Thread Safety
//!
//! The processor is cloneable and can be shared across async tasks. The
//! executor it wraps shares the ledger and the label table.

use std::collections::HashMap;

use tracing::error;

use super::executor::{CommandExecutor, ReplaySummary};
use crate::types::{LedgerCommand, LedgerError, OwnerId};

/// Result of running a single command
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// The command that was run
    pub command: LedgerCommand,

    /// The result of running it
    pub result: Result<(), LedgerError>,
}

/// A run of commands that may be scheduled together
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Owner-scoped commands, runnable per owner in parallel
    Parallel(Vec<LedgerCommand>),
    /// A command that must run alone
    Barrier(LedgerCommand),
}

/// Batch processor with owner-based partitioning
#[derive(Debug, Clone)]
pub struct CommandBatchProcessor {
    executor: CommandExecutor,
}

impl CommandBatchProcessor {
    pub fn new(executor: CommandExecutor) -> Self {
        Self { executor }
    }

    /// Cut a batch into parallel segments and barriers, keeping script order
    pub fn segment(batch: Vec<LedgerCommand>) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut pending: Vec<LedgerCommand> = Vec::new();

        for command in batch {
            if command.owner_scope().is_some() {
                pending.push(command);
            } else {
                if !pending.is_empty() {
                    segments.push(Segment::Parallel(std::mem::take(&mut pending)));
                }
                segments.push(Segment::Barrier(command));
            }
        }
        if !pending.is_empty() {
            segments.push(Segment::Parallel(pending));
        }

        segments
    }

    /// Partition owner-scoped commands by owner
    ///
    /// # Guarantees
    ///
    /// - Each command appears in exactly one sub-batch
    /// - Commands for each owner keep their original order
    pub fn partition_by_owner(
        commands: Vec<LedgerCommand>,
    ) -> HashMap<OwnerId, Vec<LedgerCommand>> {
        let mut owner_batches: HashMap<OwnerId, Vec<LedgerCommand>> = HashMap::new();

        for command in commands {
            // Segments only hold owner-scoped commands
            let owner = command.owner_scope().unwrap_or_default();
            owner_batches.entry(owner).or_default().push(command);
        }

        owner_batches
    }

    /// Run one owner's commands sequentially, in order
    ///
    /// Every command runs even if an earlier one was rejected.
    pub async fn process_owner_commands(
        &self,
        commands: Vec<LedgerCommand>,
    ) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(commands.len());

        for command in commands {
            let result = self.executor.execute(command.clone());
            results.push(ProcessingResult { command, result });
        }

        results
    }

    /// Run a batch
    ///
    /// # Guarantees
    ///
    /// - Segments run one after another, in script order
    /// - Within a parallel segment, different owners run concurrently and
    ///   each owner's commands run in order
    /// - Every command runs, even if some are rejected
    pub async fn process_batch(&self, batch: Vec<LedgerCommand>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(batch.len());

        for segment in Self::segment(batch) {
            match segment {
                Segment::Parallel(commands) => {
                    results.extend(self.process_parallel(commands).await);
                }
                Segment::Barrier(command) => {
                    let result = self.executor.execute(command.clone());
                    results.push(ProcessingResult { command, result });
                }
            }
        }

        results
    }

    async fn process_parallel(&self, commands: Vec<LedgerCommand>) -> Vec<ProcessingResult> {
        let mut tasks = Vec::new();
        for (_owner, owner_commands) in Self::partition_by_owner(commands) {
            let processor = self.clone();
            tasks.push(tokio::spawn(async move {
                processor.process_owner_commands(owner_commands).await
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            match task.await {
                Ok(owner_results) => results.extend(owner_results),
                Err(e) => error!(error = %e, "owner task panicked"),
            }
        }
        results
    }
}

/// Tally the results of a batch
pub fn summarize(results: &[ProcessingResult]) -> ReplaySummary {
    let mut summary = ReplaySummary::default();
    for result in results {
        summary.record(&result.result);
    }
    summary
}
