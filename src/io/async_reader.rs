//! Asynchronous CSV reader with batch interface
//!
//! Provides batch reading over the commands of a script file.
//!
//! # Design
//!
//! The AsyncReader uses:
//! - csv-async for streaming CSV parsing
//! - tokio (through a compat layer) for the underlying file
//! - Batch reading so the replay can schedule a batch at a time
//!
//! # Architecture
//!
//! ```text
//! Script file → AsyncReader → Batches of LedgerCommands
//!                    ↓
//!             csv_format module
//!      (CommandRecord, convert_command_record)
//! ```

use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

use crate::io::csv_format::{convert_command_record, CommandRecord};
use crate::io::sync_reader::at_line;
use crate::types::{LedgerCommand, LedgerError};

/// Asynchronous script reader
///
/// Provides a batch interface over script commands with bounded memory.
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: u64,
    malformed: usize,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a new AsyncReader over an async byte source
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 1,
            malformed: 0,
        }
    }

    /// Number of rows skipped so far because they could not be parsed
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    /// Read a batch of commands
    ///
    /// Reads up to `batch_size` valid commands. Rows that cannot be parsed
    /// are logged with their line number, counted, and skipped.
    ///
    /// # Returns
    ///
    /// The commands in script order. An empty vector means the end of the
    /// file was reached.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<LedgerCommand> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut rows = self.csv_reader.deserialize::<CommandRecord>();

        while batch.len() < batch_size {
            let Some(row) = rows.next().await else {
                break;
            };
            self.line_num += 1;

            let parsed = row
                .map_err(|e| LedgerError::ParseError {
                    line: None,
                    message: e.to_string(),
                })
                .and_then(convert_command_record)
                .map_err(|e| at_line(e, self.line_num));

            match parsed {
                Ok(command) => batch.push(command),
                Err(e) => {
                    self.malformed += 1;
                    warn!(error = %e, "skipping malformed script row");
                }
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::Cursor;
    use rust_decimal_macros::dec;

    const HEADER: &str = "op,owner,amount,ref,course,note\n";

    fn reader(rows: &str) -> AsyncReader<Cursor<Vec<u8>>> {
        AsyncReader::new(Cursor::new(format!("{}{}", HEADER, rows).into_bytes()))
    }

    #[tokio::test]
    async fn test_async_reader_read_batch() {
        let mut reader = reader(
            "submit,1,10,a,,\n\
             submit,2,20,b,,\n\
             approve,,,a,,\n",
        );

        let batch = reader.read_batch(2).await;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].owner_scope(), Some(1));
        assert_eq!(batch[1].owner_scope(), Some(2));

        let batch = reader.read_batch(2).await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].op(), "approve");

        assert!(reader.read_batch(2).await.is_empty());
    }

    #[tokio::test]
    async fn test_async_reader_empty_script() {
        let mut reader = reader("");
        assert!(reader.read_batch(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_async_reader_skips_invalid_rows() {
        let mut reader = reader(
            "teleport,1,10,,,\n\
             adjust,1,15,,,grant\n\
             submit,,10,,,\n",
        );

        let batch = reader.read_batch(10).await;

        assert_eq!(
            batch,
            vec![LedgerCommand::Adjust {
                owner: 1,
                amount: dec!(15),
                reason: "grant".to_string(),
                label: None,
            }]
        );
        assert_eq!(reader.malformed(), 2);
    }

    #[tokio::test]
    async fn test_async_reader_whitespace_and_case() {
        let mut reader = reader("  SUBMIT  ,  3  ,  7.25  ,  r9  ,,\n");

        let batch = reader.read_batch(10).await;

        assert_eq!(
            batch[0],
            LedgerCommand::Submit {
                owner: 3,
                amount: dec!(7.25),
                label: Some("r9".to_string()),
                invoice_ref: None,
            }
        );
    }
}
