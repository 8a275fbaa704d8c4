//! Data loading and boundary serialisation for the associative engine

pub mod config;
pub mod layout;
pub mod sources;

use arrow::error::ArrowError;
use assoc_core::IndexError;
use tokio::task::JoinError;
use thiserror::Error;

// Re-exports
pub use config::{FileType, LoadConfig, NullConfig};
pub use layout::{ListboxLayout, ListboxRow, SessionLayout};
pub use sources::{open_loader, CsvSource, RecordBatchSource, SqliteSource};

/// Errors that can occur in data operations
#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("CSV parsing error: {0}")]
    Csv(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Join error: {0}")]
    Join(#[from] JoinError),
}

impl From<csv::Error> for DataError {
    fn from(error: csv::Error) -> Self {
        match error.kind() {
            csv::ErrorKind::Io(io_err) => DataError::Io(std::io::Error::new(io_err.kind(), error.to_string())),
            _ => DataError::Csv(error.to_string()),
        }
    }
}
