//! Incremental construction of an [`AssociationIndex`]

use std::sync::Arc;
use ahash::AHashMap;
use indexmap::IndexMap;
use roaring::RoaringBitmap;
use tracing::debug;

use super::{AssociationIndex, FieldColumn, NO_VALUE};
use crate::error::IndexError;
use crate::model::{Field, FieldId, RecordId, Value, ValueId};

/// Builder fed by a data loader with (field, value, record) triples
#[derive(Default)]
pub struct IndexBuilder {
    fields: IndexMap<Arc<str>, ColumnBuilder>,
    /// Caller record keys from `push_triple`, mapped to dense record ids
    keys: AHashMap<RecordId, RecordId>,
    /// Records allocated so far
    record_count: u64,
}

#[derive(Default)]
struct ColumnBuilder {
    lookup: AHashMap<Arc<str>, ValueId>,
    values: Vec<Arc<str>>,
    postings: Vec<RoaringBitmap>,
    column: Vec<u32>,
}

impl ColumnBuilder {
    /// `key` is the caller's name for `record`, used in errors
    fn assign(&mut self, field: &str, record: RecordId, key: RecordId, text: &str) -> Result<(), IndexError> {
        let known = self.lookup.get(text).copied();
        let slot = record as usize;

        match self.column.get(slot).copied().unwrap_or(NO_VALUE) {
            NO_VALUE => {}
            existing if Some(ValueId(existing)) == known => return Ok(()),
            existing => {
                return Err(IndexError::ConflictingValue {
                    field: field.to_string(),
                    record: key,
                    existing: self.values[existing as usize].to_string(),
                    value: text.to_string(),
                })
            }
        }

        let value = match known {
            Some(id) => id,
            None => {
                let id = ValueId(self.values.len() as u32);
                let text: Arc<str> = Arc::from(text);
                self.lookup.insert(text.clone(), id);
                self.values.push(text);
                self.postings.push(RoaringBitmap::new());
                id
            }
        };

        if self.column.len() <= slot {
            self.column.resize(slot + 1, NO_VALUE);
        }
        self.column[slot] = value.0;
        self.postings[value.index()].insert(record);
        Ok(())
    }
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare fields up front, fixing their load order
    pub fn with_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = Self::new();
        for name in fields {
            builder.field(name.as_ref());
        }
        builder
    }

    /// Declare a field, returning its id. Declaring an existing field is a no-op.
    pub fn field(&mut self, name: &str) -> FieldId {
        if let Some(idx) = self.fields.get_index_of(name) {
            return FieldId(idx as u32);
        }
        let (idx, _) = self.fields.insert_full(Arc::from(name), ColumnBuilder::default());
        FieldId(idx as u32)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Record that the record keyed `key` holds `value` in `field`.
    ///
    /// Keys are arbitrary: each distinct key is given the next dense record
    /// id, so sparse or very large keys cost nothing extra. Records appended
    /// with [`push_row`](Self::push_row) have no key and cannot be addressed here.
    pub fn push_triple(&mut self, field: &str, value: &str, key: RecordId) -> Result<(), IndexError> {
        let id = self.field(field);
        let record = match self.keys.get(&key) {
            Some(&record) => record,
            None => {
                let record = self.allocate_record()?;
                self.keys.insert(key, record);
                record
            }
        };
        self.fields[id.index()].assign(field, record, key, value)
    }

    /// Append one record holding one cell per declared field. `None` cells hold no value.
    pub fn push_row<S: AsRef<str>>(&mut self, cells: &[Option<S>]) -> Result<RecordId, IndexError> {
        if cells.len() != self.fields.len() {
            return Err(IndexError::RowWidth {
                expected: self.fields.len(),
                actual: cells.len(),
            });
        }

        let record = self.allocate_record()?;
        for ((name, column), cell) in self.fields.iter_mut().zip(cells) {
            if let Some(text) = cell {
                column.assign(name, record, record, text.as_ref())?;
            }
        }
        Ok(record)
    }

    fn allocate_record(&mut self) -> Result<RecordId, IndexError> {
        if self.record_count > RecordId::MAX as u64 {
            return Err(IndexError::RecordOverflow { max: RecordId::MAX as u64 + 1 });
        }
        let record = self.record_count as RecordId;
        self.record_count += 1;
        Ok(record)
    }

    /// Freeze the builder into an immutable index
    pub fn build(self) -> AssociationIndex {
        let record_count = self.record_count;
        let fields: IndexMap<Arc<str>, FieldColumn> = self
            .fields
            .into_iter()
            .enumerate()
            .map(|(idx, (name, mut column))| {
                column.column.resize(record_count as usize, NO_VALUE);
                let values = column
                    .values
                    .into_iter()
                    .zip(column.postings.iter())
                    .map(|(text, records)| Value {
                        text,
                        frequency: records.len() as u32,
                    })
                    .collect();

                let built = FieldColumn {
                    field: Field {
                        id: FieldId(idx as u32),
                        name: name.clone(),
                        values,
                    },
                    lookup: column.lookup,
                    postings: column.postings,
                    column: column.column,
                };
                (name, built)
            })
            .collect();

        debug!(fields = fields.len(), records = record_count, "built association index");

        AssociationIndex { fields, record_count }
    }
}
