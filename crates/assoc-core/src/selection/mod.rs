//! Selection set: the explicit user choices, per field

use std::collections::BTreeSet;
use ahash::AHashMap;
use serde::{Serialize, Deserialize};

use crate::error::{Result, SelectionError};
use crate::index::AssociationIndex;
use crate::model::{FieldId, ValueId};

/// How a `select` call combines with the field's current selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectMode {
    /// Drop the field's current selection and select exactly the given values
    #[default]
    Replace,
    /// Flip each given value in or out of the selection
    Toggle,
    /// Add the given values to the selection
    Add,
    /// Remove the given values from the selection
    Remove,
}

/// Fields whose selection changed in one mutation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionDelta {
    pub fields: Vec<FieldId>,
}

impl SelectionDelta {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn single(field: FieldId) -> Self {
        Self { fields: vec![field] }
    }
}

/// Per-field selected values plus modification order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    /// Only fields with a non-empty selection have an entry
    selected: AHashMap<FieldId, BTreeSet<ValueId>>,
    /// Active fields, most recently modified first
    recency: Vec<FieldId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `values` to `field` according to `mode`.
    ///
    /// Every value is validated before anything changes, so a failing call
    /// leaves the set untouched. Only `field` is ever modified.
    pub fn select(
        &mut self,
        index: &AssociationIndex,
        field: FieldId,
        values: &[ValueId],
        mode: SelectMode,
    ) -> Result<SelectionDelta> {
        let meta = index
            .field(field)
            .ok_or_else(|| SelectionError::UnknownField(field.to_string()))?;

        if let Some(bad) = values.iter().find(|v| v.index() >= meta.cardinality()) {
            return Err(SelectionError::InvalidValue {
                field: meta.name.to_string(),
                value: format!("#{}", bad.0),
            });
        }

        let current = self.selected.get(&field).cloned().unwrap_or_default();
        let next: BTreeSet<ValueId> = match mode {
            SelectMode::Replace => values.iter().copied().collect(),
            SelectMode::Add => current.iter().chain(values).copied().collect(),
            SelectMode::Remove => {
                let mut next = current.clone();
                for value in values {
                    next.remove(value);
                }
                next
            }
            SelectMode::Toggle => {
                let mut next = current.clone();
                // Dedupe so a value listed twice is toggled once
                for value in values.iter().collect::<BTreeSet<_>>() {
                    if !next.remove(value) {
                        next.insert(*value);
                    }
                }
                next
            }
        };

        if next == current {
            return Ok(SelectionDelta::default());
        }

        self.store(field, next);
        Ok(SelectionDelta::single(field))
    }

    /// Empty one field's selection
    pub fn clear(&mut self, field: FieldId) -> SelectionDelta {
        if self.selected.remove(&field).is_some() {
            self.recency.retain(|f| *f != field);
            SelectionDelta::single(field)
        } else {
            SelectionDelta::default()
        }
    }

    /// Empty every field's selection
    pub fn clear_all(&mut self) -> SelectionDelta {
        let mut fields: Vec<FieldId> = self.selected.drain().map(|(field, _)| field).collect();
        fields.sort();
        self.recency.clear();
        SelectionDelta { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn has_selection(&self, field: FieldId) -> bool {
        self.selected.contains_key(&field)
    }

    pub fn is_selected(&self, field: FieldId, value: ValueId) -> bool {
        self.selected
            .get(&field)
            .map(|values| values.contains(&value))
            .unwrap_or(false)
    }

    /// Selected values of one field in value order
    pub fn selected(&self, field: FieldId) -> impl Iterator<Item = ValueId> + '_ {
        self.selected.get(&field).into_iter().flatten().copied()
    }

    /// Fields with a non-empty selection, most recently modified first
    pub fn active_fields(&self) -> &[FieldId] {
        &self.recency
    }

    /// Carry this selection over to a reloaded index.
    ///
    /// Fields and values are matched by name and text; anything missing from
    /// `to` is dropped. Modification order is kept.
    pub fn remap(&self, from: &AssociationIndex, to: &AssociationIndex) -> SelectionSet {
        let mut remapped = SelectionSet::new();

        // Oldest first so `store` rebuilds the same recency order
        for field in self.recency.iter().rev() {
            let Some(old) = from.field(*field) else { continue };
            let Some(new_id) = to.field_id(&old.name) else { continue };

            let values: BTreeSet<ValueId> = self
                .selected(*field)
                .filter_map(|value| old.value(value))
                .filter_map(|value| to.value_id(new_id, &value.text))
                .collect();

            if !values.is_empty() {
                remapped.store(new_id, values);
            }
        }

        remapped
    }

    fn store(&mut self, field: FieldId, values: BTreeSet<ValueId>) {
        self.recency.retain(|f| *f != field);
        if values.is_empty() {
            self.selected.remove(&field);
        } else {
            self.selected.insert(field, values);
            self.recency.insert(0, field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::tests::decades;
    use crate::index::IndexBuilder;

    fn ids(index: &AssociationIndex, field: FieldId, texts: &[&str]) -> Vec<ValueId> {
        texts.iter().map(|t| index.value_id(field, t).unwrap()).collect()
    }

    #[test]
    fn test_replace_only_touches_its_field() {
        let index = decades();
        let decade = index.field_id("Decade").unwrap();
        let year = index.field_id("Year").unwrap();
        let mut selection = SelectionSet::new();

        selection.select(&index, year, &ids(&index, year, &["1914"]), SelectMode::Replace).unwrap();
        selection.select(&index, decade, &ids(&index, decade, &["1910s"]), SelectMode::Replace).unwrap();
        let delta = selection
            .select(&index, decade, &ids(&index, decade, &["1920s"]), SelectMode::Replace)
            .unwrap();

        assert_eq!(delta.fields, vec![decade]);
        assert_eq!(selection.selected(year).count(), 1);
        assert_eq!(selection.selected(decade).collect::<Vec<_>>(), ids(&index, decade, &["1920s"]));
    }

    #[test]
    fn test_toggle_and_add_modes() {
        let index = decades();
        let year = index.field_id("Year").unwrap();
        let mut selection = SelectionSet::new();

        selection.select(&index, year, &ids(&index, year, &["1914", "1915"]), SelectMode::Add).unwrap();
        selection.select(&index, year, &ids(&index, year, &["1915", "1916"]), SelectMode::Toggle).unwrap();
        let selected: Vec<_> = selection.selected(year).collect();
        assert_eq!(selected, ids(&index, year, &["1914", "1916"]));

        selection.select(&index, year, &ids(&index, year, &["1914"]), SelectMode::Remove).unwrap();
        assert_eq!(selection.selected(year).collect::<Vec<_>>(), ids(&index, year, &["1916"]));

        // Toggling the last value off deactivates the field
        selection.select(&index, year, &ids(&index, year, &["1916"]), SelectMode::Toggle).unwrap();
        assert!(!selection.has_selection(year));
        assert!(selection.active_fields().is_empty());
    }

    #[test]
    fn test_invalid_value_is_all_or_nothing() {
        let index = decades();
        let year = index.field_id("Year").unwrap();
        let mut selection = SelectionSet::new();
        selection.select(&index, year, &ids(&index, year, &["1914"]), SelectMode::Replace).unwrap();
        let before = selection.clone();

        let mut values = ids(&index, year, &["1920"]);
        values.push(ValueId(99));
        let err = selection.select(&index, year, &values, SelectMode::Replace).unwrap_err();

        assert!(matches!(err, SelectionError::InvalidValue { .. }));
        assert_eq!(selection, before);
    }

    #[test]
    fn test_unknown_field() {
        let index = decades();
        let mut selection = SelectionSet::new();
        let err = selection.select(&index, FieldId(7), &[], SelectMode::Replace).unwrap_err();
        assert!(matches!(err, SelectionError::UnknownField(_)));
    }

    #[test]
    fn test_noop_select_yields_empty_delta() {
        let index = decades();
        let year = index.field_id("Year").unwrap();
        let mut selection = SelectionSet::new();
        let values = ids(&index, year, &["1914"]);

        assert!(!selection.select(&index, year, &values, SelectMode::Replace).unwrap().is_empty());
        assert!(selection.select(&index, year, &values, SelectMode::Replace).unwrap().is_empty());
        assert_eq!(selection.clear(year).fields, vec![year]);
        assert!(selection.clear(year).is_empty());
    }

    #[test]
    fn test_active_fields_most_recent_first() {
        let index = decades();
        let decade = index.field_id("Decade").unwrap();
        let year = index.field_id("Year").unwrap();
        let mut selection = SelectionSet::new();

        selection.select(&index, decade, &ids(&index, decade, &["1910s"]), SelectMode::Replace).unwrap();
        selection.select(&index, year, &ids(&index, year, &["1914"]), SelectMode::Replace).unwrap();
        assert_eq!(selection.active_fields(), &[year, decade]);

        selection.select(&index, decade, &ids(&index, decade, &["1910s", "1920s"]), SelectMode::Replace).unwrap();
        assert_eq!(selection.active_fields(), &[decade, year]);

        let delta = selection.clear_all();
        assert_eq!(delta.fields, vec![decade, year]);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_remap_onto_reloaded_index() {
        let index = decades();
        let decade = index.field_id("Decade").unwrap();
        let year = index.field_id("Year").unwrap();
        let mut selection = SelectionSet::new();
        selection.select(&index, decade, &ids(&index, decade, &["1920s"]), SelectMode::Replace).unwrap();
        selection.select(&index, year, &ids(&index, year, &["1914", "1921"]), SelectMode::Replace).unwrap();

        // Reloaded data: fields swapped, 1921 gone
        let mut builder = IndexBuilder::with_fields(["Year", "Decade"]);
        builder.push_row(&[Some("1914"), Some("1910s")]).unwrap();
        builder.push_row(&[Some("1922"), Some("1920s")]).unwrap();
        let reloaded = builder.build();

        let remapped = selection.remap(&index, &reloaded);
        let new_year = reloaded.field_id("Year").unwrap();
        let new_decade = reloaded.field_id("Decade").unwrap();

        assert_eq!(remapped.active_fields(), &[new_year, new_decade]);
        assert_eq!(remapped.selected(new_year).collect::<Vec<_>>(), ids(&reloaded, new_year, &["1914"]));
        assert_eq!(remapped.selected(new_decade).collect::<Vec<_>>(), ids(&reloaded, new_decade, &["1920s"]));
    }
}
