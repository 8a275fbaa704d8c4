use std::collections::BTreeSet;
use proptest::prelude::*;

use super::*;
use crate::index::IndexBuilder;
use crate::selection::SelectMode;

const FIELDS: [&str; 3] = ["Region", "Product", "Channel"];

type Row = (u8, u8, u8);

fn rows_strategy() -> impl Strategy<Value = Vec<Row>> {
    prop::collection::vec((0u8..3, 0u8..5, 0u8..3), 1..40)
}

/// (field index, value picks) applied in order with `Replace`
fn ops_strategy() -> impl Strategy<Value = Vec<(usize, Vec<u8>)>> {
    prop::collection::vec((0usize..3, prop::collection::vec(0u8..5, 0..3)), 0..5)
}

fn build(rows: &[Row]) -> AssociationIndex {
    let mut builder = IndexBuilder::with_fields(FIELDS);
    for (a, b, c) in rows {
        let cells = [
            Some(format!("r{a}")),
            Some(format!("p{b}")),
            Some(format!("c{c}")),
        ];
        builder
            .push_row(&cells)
            .unwrap_or_else(|e| panic!("push_row failed: {e}"));
    }
    builder.build()
}

fn apply(index: &AssociationIndex, selection: &mut SelectionSet, field: usize, picks: &[u8]) {
    let id = FieldId(field as u32);
    let cardinality = index.field(id).map(|f| f.cardinality()).unwrap_or(0) as u32;
    if cardinality == 0 {
        return;
    }
    let values: Vec<ValueId> = picks.iter().map(|p| ValueId(*p as u32 % cardinality)).collect();
    selection
        .select(index, id, &values, SelectMode::Replace)
        .unwrap_or_else(|e| panic!("select failed: {e}"));
}

fn build_selection(index: &AssociationIndex, ops: &[(usize, Vec<u8>)]) -> SelectionSet {
    let mut selection = SelectionSet::new();
    for (field, picks) in ops {
        apply(index, &mut selection, *field, picks);
    }
    selection
}

/// Reachable values of `field` computed by scanning every record
fn brute_force_possible(index: &AssociationIndex, selection: &SelectionSet, field: FieldId) -> BTreeSet<ValueId> {
    let mut possible = BTreeSet::new();
    for record in 0..index.record_count() as u32 {
        let admitted = selection.active_fields().iter().filter(|f| **f != field).all(|other| {
            index
                .value_of(*other, record)
                .map(|v| selection.is_selected(*other, v))
                .unwrap_or(false)
        });
        if admitted {
            if let Some(value) = index.value_of(field, record) {
                possible.insert(value);
            }
        }
    }
    possible
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn no_selection_means_all_possible(rows in rows_strategy()) {
        let index = build(&rows);
        let selection = SelectionSet::new();
        for resolved in Resolver::new(&index, &selection).resolve_all() {
            prop_assert!(resolved.values.iter().all(|v| v.state == State::Possible));
        }
    }

    #[test]
    fn states_match_brute_force(rows in rows_strategy(), ops in ops_strategy()) {
        let index = build(&rows);
        let selection = build_selection(&index, &ops);
        let resolver = Resolver::new(&index, &selection);

        for resolved in resolver.resolve_all() {
            let possible = brute_force_possible(&index, &selection, resolved.field);
            let has_selection = selection.has_selection(resolved.field);
            for value in &resolved.values {
                let selected = selection.is_selected(resolved.field, value.value);
                let reachable = possible.contains(&value.value);
                let expected = match (selected, reachable) {
                    (true, true) => State::Selected,
                    (true, false) => State::SelectedExcluded,
                    (false, true) if has_selection => State::Alternative,
                    (false, true) => State::Possible,
                    (false, false) => State::Excluded,
                };
                prop_assert_eq!(value.state, expected);
                prop_assert_eq!(value.state.is_selected(), selected);
            }
        }
    }

    #[test]
    fn replace_is_idempotent(rows in rows_strategy(), ops in ops_strategy(), field in 0usize..3, picks in prop::collection::vec(0u8..5, 1..3)) {
        let index = build(&rows);
        let mut selection = build_selection(&index, &ops);

        apply(&index, &mut selection, field, &picks);
        let once = Resolver::new(&index, &selection).resolve_all();
        apply(&index, &mut selection, field, &picks);
        let twice = Resolver::new(&index, &selection).resolve_all();

        prop_assert_eq!(once, twice);
    }

    #[test]
    fn clear_restores_previous_resolution(rows in rows_strategy(), ops in ops_strategy(), field in 0usize..3, picks in prop::collection::vec(0u8..5, 1..3)) {
        let index = build(&rows);
        let others: Vec<_> = ops.into_iter().filter(|(f, _)| *f != field).collect();
        let mut selection = build_selection(&index, &others);
        let before = Resolver::new(&index, &selection).resolve_all();

        apply(&index, &mut selection, field, &picks);
        selection.clear(FieldId(field as u32));
        let after = Resolver::new(&index, &selection).resolve_all();

        prop_assert_eq!(before, after);
    }

    #[test]
    fn clear_all_round_trip(rows in rows_strategy(), ops in ops_strategy()) {
        let index = build(&rows);
        let mut selection = build_selection(&index, &ops);
        selection.clear_all();

        prop_assert!(selection.active_fields().is_empty());
        for resolved in Resolver::new(&index, &selection).resolve_all() {
            prop_assert!(resolved.values.iter().all(|v| v.state == State::Possible));
        }
    }
}
