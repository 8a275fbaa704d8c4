//! Data model types shared by the index, the selection set and the resolver

use std::fmt;
use std::sync::Arc;
use serde::{Serialize, Deserialize};

/// Identifier of a record (one row of the flattened fact table)
pub type RecordId = u32;

/// Position of a field in load order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub u32);

/// Position of a value inside its field, in first-seen order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId(pub u32);

impl FieldId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ValueId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One distinct data element of a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
    /// Display text
    pub text: Arc<str>,

    /// Number of records holding this value
    pub frequency: u32,
}

/// A named dimension of the data model
#[derive(Debug, Clone)]
pub struct Field {
    pub id: FieldId,
    pub name: Arc<str>,
    pub values: Vec<Value>,
}

impl Field {
    /// Number of distinct values
    pub fn cardinality(&self) -> usize {
        self.values.len()
    }

    pub fn value(&self, id: ValueId) -> Option<&Value> {
        self.values.get(id.index())
    }

    pub fn value_ids(&self) -> impl Iterator<Item = ValueId> + '_ {
        (0..self.values.len() as u32).map(ValueId)
    }
}

/// Selection state of a value under the current selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Explicitly selected and still reachable
    Selected,
    /// Reachable, and its field carries no selection
    Possible,
    /// Reachable but not chosen in a field that has a selection
    Alternative,
    /// Not reachable under the other fields' selections
    Excluded,
    /// Explicitly selected but made unreachable by another field
    SelectedExcluded,
}

impl State {
    pub const ALL: [State; 5] = [
        State::Selected,
        State::Possible,
        State::Alternative,
        State::Excluded,
        State::SelectedExcluded,
    ];

    /// True for the two states a value can only have while it is in its field's selection
    pub fn is_selected(self) -> bool {
        matches!(self, State::Selected | State::SelectedExcluded)
    }

    /// True when the value is reachable under the other fields' selections
    pub fn is_reachable(self) -> bool {
        matches!(self, State::Selected | State::Possible | State::Alternative)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::Selected => "selected",
            State::Possible => "possible",
            State::Alternative => "alternative",
            State::Excluded => "excluded",
            State::SelectedExcluded => "selected_excluded",
        }
    }

    /// Rank used when listboxes sort by state
    pub(crate) fn sort_rank(self) -> u8 {
        match self {
            State::Selected => 0,
            State::Possible => 1,
            State::Alternative => 2,
            State::SelectedExcluded => 3,
            State::Excluded => 4,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(State::Selected.is_selected());
        assert!(State::SelectedExcluded.is_selected());
        assert!(!State::Alternative.is_selected());
        assert!(State::Alternative.is_reachable());
        assert!(!State::SelectedExcluded.is_reachable());
        assert!(!State::Excluded.is_reachable());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&State::SelectedExcluded).unwrap();
        assert_eq!(json, "\"selected_excluded\"");
        let back: State = serde_json::from_str("\"alternative\"").unwrap();
        assert_eq!(back, State::Alternative);
    }
}
