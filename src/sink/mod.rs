//! Result sinks.
//!
//! - [`FileSink`]: sorted, deduplicated newline-separated text file
//! - [`SqliteSink`]: one row per input key, upserted as keys complete

pub mod file;
pub mod sqlite;

pub use file::FileSink;
pub use sqlite::SqliteSink;
