//! Serialisable listbox layouts handed to presentation layers

use serde::{Serialize, Deserialize};

use assoc_core::{CurrentSelection, ListboxSort, ResolvedField, Session, SessionId, SessionSnapshot, State, StateCounts};
use crate::DataError;

/// One visible row of a listbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListboxRow {
    pub text: String,
    pub state: State,
    pub frequency: u32,
}

/// A field's values with their states, in display order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListboxLayout {
    pub field: String,
    pub rows: Vec<ListboxRow>,
    pub counts: StateCounts,
}

impl ListboxLayout {
    pub fn from_resolved(resolved: &ResolvedField, sort: ListboxSort) -> Self {
        let rows = resolved
            .sorted(sort)
            .into_iter()
            .map(|value| ListboxRow {
                text: value.text.to_string(),
                state: value.state,
                frequency: value.frequency,
            })
            .collect();

        Self {
            field: resolved.name.to_string(),
            rows,
            counts: resolved.counts(),
        }
    }

    pub fn to_json(&self) -> Result<String, DataError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Everything a front end needs to redraw one session
#[derive(Debug, Clone, Serialize)]
pub struct SessionLayout {
    pub session: SessionId,
    pub sequence: u64,
    pub selections: Vec<CurrentSelection>,
    pub listboxes: Vec<ListboxLayout>,
}

impl SessionLayout {
    pub fn from_session(session: &Session, sort: ListboxSort) -> Self {
        Self::from_snapshot(session.id(), session.snapshot(), sort)
    }

    pub fn from_snapshot(session: SessionId, snapshot: SessionSnapshot, sort: ListboxSort) -> Self {
        let listboxes = snapshot
            .resolved
            .iter()
            .map(|resolved| ListboxLayout::from_resolved(resolved, sort))
            .collect();

        Self {
            session,
            sequence: snapshot.sequence,
            selections: snapshot.selections,
            listboxes,
        }
    }

    /// Only the listboxes whose field name passes `keep`
    pub fn retain_fields<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.listboxes.retain(|listbox| keep(&listbox.field));
    }

    pub fn to_json_pretty(&self) -> Result<String, DataError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
