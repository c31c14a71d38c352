//! I/O module
//!
//! Handles command script parsing and report output.
//!
//! # Components
//!
//! - `csv_format` - Format handling (row conversion, report serialization)
//! - `sync_reader` - Synchronous script reader with iterator interface
//! - `async_reader` - Asynchronous script reader with batch reading interface
//! - `report` - Selection of the report written after a replay

pub mod async_reader;
pub mod csv_format;
pub mod report;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{
    convert_command_record, write_export_csv, write_statistics_json, write_wallets_csv,
    CommandRecord,
};
pub use report::write_report;
pub use sync_reader::SyncReader;
