//! State resolver: derives every value's state from the current selection
//!
//! For a target field F the candidate records are the intersection, over
//! every *other* field with a selection, of the union of its selected
//! values' records. F's own selection never narrows F's possible set; that
//! asymmetry is what separates `Alternative` from `Excluded`.

mod listbox;
#[cfg(test)]
mod properties;

use std::sync::Arc;
use rayon::prelude::*;
use roaring::RoaringBitmap;
use serde::{Serialize, Deserialize};
use tracing::debug;

pub use listbox::{ListboxSort, StateCounts};

use crate::error::{Result, SelectionError};
use crate::index::{AssociationIndex, Candidates, ValueMask};
use crate::model::{FieldId, State, ValueId};
use crate::selection::SelectionSet;

/// Resolver tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Field count from which `resolve_all` fans out over the rayon pool
    pub parallel_threshold: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self { parallel_threshold: 16 }
    }
}

/// One value of a resolved field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedValue {
    pub value: ValueId,
    pub text: Arc<str>,
    pub state: State,
    pub frequency: u32,
}

/// Every value of one field with its state, in load order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedField {
    pub field: FieldId,
    pub name: Arc<str>,
    pub values: Vec<ResolvedValue>,
}

impl ResolvedField {
    pub fn state_of(&self, value: ValueId) -> Option<State> {
        self.values.get(value.index()).map(|v| v.state)
    }

    pub fn state_of_text(&self, text: &str) -> Option<State> {
        self.values.iter().find(|v| &*v.text == text).map(|v| v.state)
    }

    /// Values currently in `state`
    pub fn with_state(&self, state: State) -> impl Iterator<Item = &ResolvedValue> + '_ {
        self.values.iter().filter(move |v| v.state == state)
    }

    pub fn counts(&self) -> StateCounts {
        StateCounts::tally(self.values.iter().map(|v| v.state))
    }

    /// True when both resolutions assign the same state to every value
    pub fn same_states(&self, other: &ResolvedField) -> bool {
        self.field == other.field
            && self.values.len() == other.values.len()
            && self.values.iter().zip(&other.values).all(|(a, b)| a.state == b.state)
    }

    /// Values ordered for display
    pub fn sorted(&self, sort: ListboxSort) -> Vec<&ResolvedValue> {
        let mut values: Vec<_> = self.values.iter().collect();
        sort.apply(&mut values);
        values
    }
}

/// Resolution context for one selection snapshot
pub struct Resolver<'a> {
    index: &'a AssociationIndex,
    selection: &'a SelectionSet,
    /// Union of selected records per active field, smallest first
    constraints: Vec<(FieldId, RoaringBitmap)>,
    settings: ResolverSettings,
}

impl<'a> Resolver<'a> {
    pub fn new(index: &'a AssociationIndex, selection: &'a SelectionSet) -> Self {
        Self::with_settings(index, selection, ResolverSettings::default())
    }

    pub fn with_settings(
        index: &'a AssociationIndex,
        selection: &'a SelectionSet,
        settings: ResolverSettings,
    ) -> Self {
        let mut constraints: Vec<(FieldId, RoaringBitmap)> = selection
            .active_fields()
            .iter()
            .map(|field| (*field, index.records_for_any(*field, selection.selected(*field))))
            .collect();
        constraints.sort_by_key(|(_, records)| records.len());

        Self {
            index,
            selection,
            constraints,
            settings,
        }
    }

    /// Records satisfying every selected field except `field`
    pub fn candidates_for(&self, field: FieldId) -> Candidates {
        self.constraints
            .iter()
            .filter(|(constrained, _)| *constrained != field)
            .fold(Candidates::All, |candidates, (_, records)| candidates.intersect(records))
    }

    /// Values of `field` reachable under the other fields' selections
    pub fn possible_values(&self, field: FieldId) -> Result<ValueMask> {
        self.index
            .values_reachable(field, &self.candidates_for(field))
            .ok_or_else(|| SelectionError::UnknownField(field.to_string()))
    }

    pub fn resolve(&self, field: FieldId) -> Result<ResolvedField> {
        let meta = self
            .index
            .field(field)
            .ok_or_else(|| SelectionError::UnknownField(field.to_string()))?;
        let possible = self.possible_values(field)?;
        let has_selection = self.selection.has_selection(field);

        let values = meta
            .values
            .iter()
            .zip(meta.value_ids())
            .map(|(value, id)| {
                let reachable = possible.contains(id);
                let state = match (self.selection.is_selected(field, id), reachable) {
                    (true, true) => State::Selected,
                    (true, false) => State::SelectedExcluded,
                    (false, true) if has_selection => State::Alternative,
                    (false, true) => State::Possible,
                    (false, false) => State::Excluded,
                };
                ResolvedValue {
                    value: id,
                    text: value.text.clone(),
                    state,
                    frequency: value.frequency,
                }
            })
            .collect();

        Ok(ResolvedField {
            field,
            name: meta.name.clone(),
            values,
        })
    }

    /// Resolve every field, in load order
    pub fn resolve_all(&self) -> Vec<ResolvedField> {
        let ids: Vec<FieldId> = self.index.fields().map(|f| f.id).collect();
        let parallel = ids.len() >= self.settings.parallel_threshold;
        debug!(fields = ids.len(), parallel, "resolving all fields");

        // Ids come from the index itself, so resolution cannot fail here
        if parallel {
            ids.par_iter().filter_map(|id| self.resolve(*id).ok()).collect()
        } else {
            ids.iter().filter_map(|id| self.resolve(*id).ok()).collect()
        }
    }
}
