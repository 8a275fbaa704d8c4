//! Presentation helpers for resolved fields

use std::cmp::Ordering;
use serde::{Serialize, Deserialize};

use super::ResolvedValue;
use crate::model::State;

/// Per-state tallies of one field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub selected: usize,
    pub possible: usize,
    pub alternative: usize,
    pub excluded: usize,
    pub selected_excluded: usize,
}

impl StateCounts {
    pub fn tally<I: IntoIterator<Item = State>>(states: I) -> Self {
        let mut counts = Self::default();
        for state in states {
            match state {
                State::Selected => counts.selected += 1,
                State::Possible => counts.possible += 1,
                State::Alternative => counts.alternative += 1,
                State::Excluded => counts.excluded += 1,
                State::SelectedExcluded => counts.selected_excluded += 1,
            }
        }
        counts
    }

    pub fn get(&self, state: State) -> usize {
        match state {
            State::Selected => self.selected,
            State::Possible => self.possible,
            State::Alternative => self.alternative,
            State::Excluded => self.excluded,
            State::SelectedExcluded => self.selected_excluded,
        }
    }

    pub fn total(&self) -> usize {
        State::ALL.iter().map(|s| self.get(*s)).sum()
    }
}

/// Display order of a listbox
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListboxSort {
    /// First-seen order from the data load
    #[default]
    LoadOrder,
    /// Selected first, then reachable, then excluded; load order within a state
    State,
    /// By text, numerically when both texts are numbers
    Text,
}

impl ListboxSort {
    pub(crate) fn apply(self, values: &mut [&ResolvedValue]) {
        match self {
            ListboxSort::LoadOrder => values.sort_by_key(|v| v.value),
            ListboxSort::State => values.sort_by_key(|v| (v.state.sort_rank(), v.value)),
            ListboxSort::Text => values.sort_by(|a, b| compare_text(&a.text, &b.text)),
        }
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        // Numbers before text
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
