//! In-memory Arrow source

use async_trait::async_trait;
use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use tracing::info;

use assoc_core::{AssociationIndex, DataLoader, IndexBuilder};
use crate::config::NullConfig;
use crate::DataError;

/// Loads an Arrow record batch already held in memory. Every column
/// becomes a field; cells are keyed by their display text.
pub struct RecordBatchSource {
    batches: Vec<RecordBatch>,
    name: String,
}

impl RecordBatchSource {
    pub fn new(name: impl Into<String>, batch: RecordBatch) -> Self {
        Self::from_batches(name, vec![batch])
    }

    /// Batches must share one schema; records follow batch order
    pub fn from_batches(name: impl Into<String>, batches: Vec<RecordBatch>) -> Self {
        Self {
            batches,
            name: name.into(),
        }
    }

    pub fn read_index(&self) -> Result<AssociationIndex, DataError> {
        let Some(first) = self.batches.first() else {
            return Ok(AssociationIndex::empty());
        };
        let schema = first.schema();
        let nulls = NullConfig::empty_only();
        let mut builder = IndexBuilder::with_fields(schema.fields().iter().map(|f| f.name().as_str()));

        let mut cells: Vec<Option<String>> = Vec::with_capacity(schema.fields().len());
        for batch in &self.batches {
            if batch.schema() != schema {
                return Err(DataError::Schema(format!(
                    "batches of '{}' do not share one schema",
                    self.name
                )));
            }
            for row in 0..batch.num_rows() {
                cells.clear();
                for column in batch.columns() {
                    let cell = if column.is_null(row) {
                        None
                    } else {
                        let text = array_value_to_string(column, row)?;
                        nulls.normalize(&text).map(str::to_string)
                    };
                    cells.push(cell);
                }
                builder.push_row(&cells)?;
            }
        }
        Ok(builder.build())
    }
}

#[async_trait]
impl DataLoader for RecordBatchSource {
    async fn load(&self) -> anyhow::Result<AssociationIndex> {
        let index = self.read_index()?;
        info!(
            source = %self.name,
            fields = index.field_count(),
            records = index.record_count(),
            "loaded record batches"
        );
        Ok(index)
    }

    fn source_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use arrow::array::{Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    fn batch(lines: Vec<Option<&str>>, units: Vec<Option<i64>>) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("ProductLine", DataType::Utf8, true),
            Field::new("Units", DataType::Int64, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![Arc::new(StringArray::from(lines)), Arc::new(Int64Array::from(units))],
        )
        .unwrap()
    }

    #[test]
    fn test_columns_become_fields() {
        let source = RecordBatchSource::new(
            "sales",
            batch(
                vec![Some("Electronics"), Some("Electronics"), None, Some("")],
                vec![Some(3), None, Some(3), Some(12)],
            ),
        );
        let index = source.read_index().unwrap();
        assert_eq!(index.record_count(), 4);

        let line = index.field_id("ProductLine").unwrap();
        assert_eq!(index.field(line).unwrap().cardinality(), 1);
        assert_eq!(index.value_of(line, 2), None);
        assert_eq!(index.value_of(line, 3), None);

        let units = index.field_id("Units").unwrap();
        let three = index.value_id(units, "3").unwrap();
        assert_eq!(index.field(units).unwrap().value(three).unwrap().frequency, 2);
        assert_eq!(index.value_of(units, 1), None);
    }

    #[test]
    fn test_multiple_batches_append_records() {
        let source = RecordBatchSource::from_batches(
            "sales",
            vec![
                batch(vec![Some("Electronics")], vec![Some(1)]),
                batch(vec![Some("Sports & Travel")], vec![Some(2)]),
            ],
        );
        let index = source.read_index().unwrap();
        let line = index.field_id("ProductLine").unwrap();
        assert_eq!(index.value_of(line, 1), index.value_id(line, "Sports & Travel"));
    }

    #[test]
    fn test_mismatched_schemas_rejected() {
        let other = RecordBatch::try_new(
            Arc::new(Schema::new(vec![Field::new("Region", DataType::Utf8, false)])),
            vec![Arc::new(StringArray::from(vec!["North"]))],
        )
        .unwrap();
        let source = RecordBatchSource::from_batches("mixed", vec![batch(vec![Some("x")], vec![Some(1)]), other]);
        assert!(matches!(source.read_index(), Err(DataError::Schema(_))));
    }

    #[test]
    fn test_no_batches_is_empty_index() {
        let source = RecordBatchSource::from_batches("nothing", Vec::new());
        assert_eq!(source.read_index().unwrap().field_count(), 0);
    }
}
