//! CSV data source

use std::fs::File;
use std::io::{BufReader, Read};
use async_trait::async_trait;
use csv::ReaderBuilder;
use tracing::{debug, info};

use assoc_core::{AssociationIndex, DataLoader, IndexBuilder};
use crate::config::LoadConfig;
use crate::DataError;

/// CSV source: one field per selected column, one record per row
#[derive(Clone)]
pub struct CsvSource {
    config: LoadConfig,
    name: String,
}

impl CsvSource {
    pub fn new(config: LoadConfig) -> Result<Self, DataError> {
        config.validate()?;
        let name = config.file_name();
        Ok(Self { config, name })
    }

    /// Read the whole file and build the index on the calling thread
    pub fn read_index(&self) -> Result<AssociationIndex, DataError> {
        let file = File::open(&self.config.path)?;
        read_index(BufReader::new(file), &self.config)
    }
}

/// Build an index from CSV text
pub(crate) fn read_index<R: Read>(reader: R, config: &LoadConfig) -> Result<AssociationIndex, DataError> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(config.has_headers)
        .delimiter(config.delimiter_byte()?)
        .flexible(false)
        .from_reader(reader);

    let headers: Vec<String> = if config.has_headers {
        csv_reader.headers()?.iter().map(|h| h.trim().to_string()).collect()
    } else {
        // Unnamed columns get positional names: @1, @2, ...
        let width = csv_reader.headers()?.len();
        (1..=width).map(|i| format!("@{i}")).collect()
    };

    // Columns kept, in file order
    let kept: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(_, name)| config.includes_field(name))
        .map(|(idx, _)| idx)
        .collect();

    if let Some(missing) = config
        .selected_fields
        .iter()
        .find(|field| !headers.contains(field))
    {
        return Err(DataError::Schema(format!("field '{missing}' not found in {}", config.file_name())));
    }

    let mut builder = IndexBuilder::new();
    for idx in &kept {
        let name = &headers[*idx];
        let declared = builder.field_count();
        if builder.field(name).index() < declared {
            return Err(DataError::Schema(format!("duplicate field '{name}'")));
        }
    }

    // Without headers the peeked first row is still yielded as data
    let mut record = csv::StringRecord::new();
    while csv_reader.read_record(&mut record)? {
        push_record(&mut builder, &record, &kept, config)?;
    }

    debug!(
        source = %config.file_name(),
        fields = kept.len(),
        records = builder.record_count(),
        "read CSV source"
    );
    Ok(builder.build())
}

fn push_record(
    builder: &mut IndexBuilder,
    record: &csv::StringRecord,
    kept: &[usize],
    config: &LoadConfig,
) -> Result<(), DataError> {
    let cells: Vec<Option<&str>> = kept
        .iter()
        .map(|idx| record.get(*idx).and_then(|cell| config.null_config.normalize(cell)))
        .collect();
    builder.push_row(&cells)?;
    Ok(())
}

#[async_trait]
impl DataLoader for CsvSource {
    async fn load(&self) -> anyhow::Result<AssociationIndex> {
        let source = self.clone();
        let index = tokio::task::spawn_blocking(move || source.read_index())
            .await
            .map_err(DataError::from)??;

        info!(
            source = %self.name,
            fields = index.field_count(),
            records = index.record_count(),
            "loaded CSV source"
        );
        Ok(index)
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}
