//! Association index: per-field inverted index from value to record set
//!
//! The index is built once from loader output and never mutated afterwards.
//! Sessions hold it behind an `Arc` so a reload is a pointer swap.

mod builder;

use std::sync::Arc;
use ahash::AHashMap;
use indexmap::IndexMap;
use roaring::RoaringBitmap;

pub use builder::IndexBuilder;

use crate::model::{Field, FieldId, RecordId, ValueId};

/// Column marker for a record holding no value in a field
pub(crate) const NO_VALUE: u32 = u32::MAX;

/// Records a resolution is restricted to
#[derive(Debug, Clone, PartialEq)]
pub enum Candidates {
    /// Every record of the index
    All,
    /// Only the records in the bitmap
    Subset(RoaringBitmap),
}

impl Candidates {
    /// Narrow to the records also present in `records`
    pub fn intersect(self, records: &RoaringBitmap) -> Self {
        match self {
            Candidates::All => Candidates::Subset(records.clone()),
            Candidates::Subset(mut current) => {
                current &= records;
                Candidates::Subset(current)
            }
        }
    }
}

/// Set of values of one field, addressed by [`ValueId`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueMask {
    bits: Vec<bool>,
}

impl ValueMask {
    pub fn empty(cardinality: usize) -> Self {
        Self { bits: vec![false; cardinality] }
    }

    pub fn full(cardinality: usize) -> Self {
        Self { bits: vec![true; cardinality] }
    }

    pub fn insert(&mut self, value: ValueId) {
        if let Some(bit) = self.bits.get_mut(value.index()) {
            *bit = true;
        }
    }

    pub fn contains(&self, value: ValueId) -> bool {
        self.bits.get(value.index()).copied().unwrap_or(false)
    }

    /// Number of values in the set
    pub fn len(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|b| *b)
    }

    pub fn iter(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, set)| **set)
            .map(|(idx, _)| ValueId(idx as u32))
    }
}

pub(crate) struct FieldColumn {
    pub(crate) field: Field,
    pub(crate) lookup: AHashMap<Arc<str>, ValueId>,
    /// Records per value, indexed by `ValueId`
    pub(crate) postings: Vec<RoaringBitmap>,
    /// Value per record, `NO_VALUE` where the record holds none
    pub(crate) column: Vec<u32>,
}

/// Immutable snapshot of the loaded data model
pub struct AssociationIndex {
    fields: IndexMap<Arc<str>, FieldColumn>,
    record_count: u64,
}

impl AssociationIndex {
    pub fn builder() -> IndexBuilder {
        IndexBuilder::new()
    }

    /// An index with no fields and no records
    pub fn empty() -> Self {
        IndexBuilder::new().build()
    }

    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Fields in load order
    pub fn fields(&self) -> impl Iterator<Item = &Field> + '_ {
        self.fields.values().map(|column| &column.field)
    }

    pub fn field(&self, id: FieldId) -> Option<&Field> {
        self.column(id).map(|column| &column.field)
    }

    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.fields.get_index_of(name).map(|idx| FieldId(idx as u32))
    }

    pub fn value_id(&self, field: FieldId, text: &str) -> Option<ValueId> {
        self.column(field)?.lookup.get(text).copied()
    }

    /// The value `record` holds in `field`, if any
    pub fn value_of(&self, field: FieldId, record: RecordId) -> Option<ValueId> {
        let column = self.column(field)?;
        match column.column.get(record as usize) {
            Some(&NO_VALUE) | None => None,
            Some(&value) => Some(ValueId(value)),
        }
    }

    /// All records where `field` holds `value`
    pub fn records_for(&self, field: FieldId, value: ValueId) -> Option<&RoaringBitmap> {
        self.column(field)?.postings.get(value.index())
    }

    /// Union of the records of several values of one field
    pub fn records_for_any<I>(&self, field: FieldId, values: I) -> RoaringBitmap
    where
        I: IntoIterator<Item = ValueId>,
    {
        let mut records = RoaringBitmap::new();
        if let Some(column) = self.column(field) {
            for value in values {
                if let Some(posting) = column.postings.get(value.index()) {
                    records |= posting;
                }
            }
        }
        records
    }

    /// Distinct values of `field` present among `candidates`
    pub fn values_reachable(&self, field: FieldId, candidates: &Candidates) -> Option<ValueMask> {
        let column = self.column(field)?;
        let cardinality = column.field.cardinality();

        let records = match candidates {
            Candidates::All => return Some(ValueMask::full(cardinality)),
            Candidates::Subset(records) => records,
        };

        let mut mask = ValueMask::empty(cardinality);
        if records.len() < (cardinality as u64).saturating_mul(8) {
            // Few candidates: walk them through the record column
            for record in records.iter() {
                match column.column.get(record as usize) {
                    Some(&NO_VALUE) | None => {}
                    Some(&value) => mask.insert(ValueId(value)),
                }
            }
        } else {
            for (idx, posting) in column.postings.iter().enumerate() {
                if !posting.is_disjoint(records) {
                    mask.insert(ValueId(idx as u32));
                }
            }
        }
        Some(mask)
    }

    fn column(&self, id: FieldId) -> Option<&FieldColumn> {
        self.fields.get_index(id.index()).map(|(_, column)| column)
    }
}

impl std::fmt::Debug for AssociationIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssociationIndex")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("record_count", &self.record_count)
            .finish()
    }
}
