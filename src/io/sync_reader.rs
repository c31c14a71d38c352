//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over the commands of a script file.
//! Delegates CSV format concerns to the csv_format module.
//!
//! # Design
//!
//! The SyncReader uses csv::Reader to read and deserialize rows sequentially,
//! delegating conversion to the csv_format module. Rows are processed one at
//! a time without loading the entire file into memory.
//!
//! # Iterator Interface
//!
//! SyncReader implements the Iterator trait, yielding
//! `Result<LedgerCommand, LedgerError>` for each row:
//!
//! ```no_run
//! use credit_wallet_ledger::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("commands.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(command) => println!("Replaying: {}", command.op()),
//!         Err(e) => eprintln!("Skipped: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found) are returned from `new()`
//! - Individual row errors are yielded as Err variants carrying the line
//!   number of the row

use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, Trim};

use crate::io::csv_format::{convert_command_record, CommandRecord};
use crate::types::{LedgerCommand, LedgerError};

/// Synchronous script reader
///
/// Provides an iterator interface over script commands with constant memory
/// usage.
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    line_num: u64,
}

impl SyncReader {
    /// Create a new SyncReader from a file path
    ///
    /// The CSV reader is configured to:
    /// - Trim whitespace from all fields
    /// - Allow flexible field counts (trailing optional columns may be omitted)
    /// - Use an 8KB buffer for efficient I/O
    ///
    /// # Returns
    ///
    /// * `Ok(SyncReader)` if the file opened successfully
    /// * `Err(LedgerError::FileNotFound)` if the file does not exist
    /// * `Err(LedgerError::IoError)` if it could not be opened otherwise
    pub fn new(path: &Path) -> Result<Self, LedgerError> {
        let file = File::open(path).map_err(|e| open_error(path, e))?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 1,
        })
    }
}

/// Map a failure to open the script onto the matching error
pub(crate) fn open_error(path: &Path, error: std::io::Error) -> LedgerError {
    match error.kind() {
        std::io::ErrorKind::NotFound => LedgerError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => LedgerError::IoError {
            message: format!("Failed to open file '{}': {}", path.display(), error),
        },
    }
}

/// Attach a line number to a row error
pub(crate) fn at_line(error: LedgerError, line: u64) -> LedgerError {
    match error {
        LedgerError::ParseError { message, .. } => LedgerError::ParseError {
            line: Some(line),
            message,
        },
        other => other,
    }
}

impl Iterator for SyncReader {
    type Item = Result<LedgerCommand, LedgerError>;

    /// Get the next command from the script
    ///
    /// # Returns
    ///
    /// * `Some(Ok(LedgerCommand))` - Successfully parsed row
    /// * `Some(Err(LedgerError))` - Parse or conversion error with line number
    /// * `None` - End of file reached
    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<CommandRecord>();
        let row = deserializer.next()?;
        self.line_num += 1;

        let line = self.line_num;
        Some(
            row.map_err(LedgerError::from)
                .and_then(convert_command_record)
                .map_err(|e| at_line(e, line)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorKind;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "op,owner,amount,ref,course,note\n";

    /// Helper function to create a temporary script file for testing
    fn create_temp_csv(rows: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(HEADER.as_bytes())
            .and_then(|_| file.write_all(rows.as_bytes()))
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    #[test]
    fn test_sync_reader_fails_on_missing_file() {
        let err = SyncReader::new(Path::new("nonexistent.csv")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(matches!(err, LedgerError::FileNotFound { .. }));
    }

    #[test]
    fn test_sync_reader_iterates_commands() {
        let file = create_temp_csv(
            "submit,1,50,r1,,inv-1\n\
             approve,,60,r1,,\n\
             bulk_reject,,,r2;r3,,duplicate\n",
        );

        let commands: Vec<_> = SyncReader::new(file.path()).unwrap().collect();

        assert_eq!(commands.len(), 3);
        assert_eq!(
            commands[0].as_ref().unwrap(),
            &LedgerCommand::Submit {
                owner: 1,
                amount: dec!(50),
                label: Some("r1".to_string()),
                invoice_ref: Some("inv-1".to_string()),
            }
        );
        assert_eq!(commands[1].as_ref().unwrap().op(), "approve");
        assert_eq!(commands[2].as_ref().unwrap().op(), "bulk_reject");
    }

    #[test]
    fn test_sync_reader_accepts_short_rows() {
        let file = create_temp_csv("approve,,,r1\n");

        let commands: Vec<_> = SyncReader::new(file.path()).unwrap().collect();

        assert_eq!(
            commands[0].as_ref().unwrap(),
            &LedgerCommand::Approve {
                target: "r1".to_string(),
                amount: None,
            }
        );
    }

    #[test]
    fn test_sync_reader_includes_line_numbers_and_continues() {
        let file = create_temp_csv(
            "submit,1,50,r1,,\n\
             submit,x,50,r2,,\n\
             launch,1,,,,\n\
             adjust,2,10,,,grant\n",
        );

        let commands: Vec<_> = SyncReader::new(file.path()).unwrap().collect();

        assert_eq!(commands.len(), 4);
        assert!(commands[0].is_ok());
        assert!(commands[3].is_ok());
        // Line 3: header is line 1
        assert!(matches!(commands[1], Err(LedgerError::ParseError { line: Some(3), .. })));
        assert!(matches!(commands[2], Err(LedgerError::ParseError { line: Some(4), .. })));
    }

    #[test]
    fn test_sync_reader_handles_whitespace() {
        let file = create_temp_csv("  adjust  ,  2  , -5.5 ,, ,  penalty  \n");

        let commands: Vec<_> = SyncReader::new(file.path()).unwrap().collect();

        assert_eq!(
            commands[0].as_ref().unwrap(),
            &LedgerCommand::Adjust {
                owner: 2,
                amount: dec!(-5.5),
                reason: "penalty".to_string(),
                label: None,
            }
        );
    }

    #[test]
    fn test_sync_reader_handles_empty_file_after_header() {
        let file = create_temp_csv("");
        assert_eq!(SyncReader::new(file.path()).unwrap().count(), 0);
    }
}
