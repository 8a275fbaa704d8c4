pub mod csv_source;
pub mod record_batch_source;
pub mod sqlite_source;

pub use csv_source::CsvSource;
pub use record_batch_source::RecordBatchSource;
pub use sqlite_source::SqliteSource;

use assoc_core::DataLoader;
use crate::config::{FileType, LoadConfig};
use crate::DataError;

/// Pick the loader matching the configured file type
pub fn open_loader(config: LoadConfig) -> Result<Box<dyn DataLoader>, DataError> {
    Ok(match config.file_type {
        FileType::Csv => Box::new(CsvSource::new(config)?),
        FileType::Sqlite => Box::new(SqliteSource::new(config)?),
    })
}
