//! Terminal rendering of session layouts as comfy-table listboxes

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use assoc_core::State;
use assoc_data::{ListboxLayout, SessionLayout};

pub fn print_layout(layout: &SessionLayout) {
    if layout.selections.is_empty() {
        println!("No selections");
    }
    for selection in &layout.selections {
        println!("{} = {}", selection.field, selection.values.join(", "));
    }
    for listbox in &layout.listboxes {
        println!();
        println!("{}", listbox_title(listbox));
        println!("{}", listbox_table(listbox));
    }
}

fn listbox_title(listbox: &ListboxLayout) -> String {
    let counts = &listbox.counts;
    format!(
        "{} ({} values: {} selected, {} possible, {} alternative, {} excluded, {} selected-excluded)",
        listbox.field,
        counts.total(),
        counts.selected,
        counts.possible,
        counts.alternative,
        counts.excluded,
        counts.selected_excluded,
    )
}

pub fn listbox_table(listbox: &ListboxLayout) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100);
    table.set_header(vec![header_cell("Value"), header_cell("State"), header_cell("Frequency")]);
    if let Some(column) = table.column_mut(2) {
        column.set_cell_alignment(CellAlignment::Right);
    }

    for row in &listbox.rows {
        let color = state_color(row.state);
        let mut value = Cell::new(&row.text).fg(color);
        if row.state.is_selected() {
            value = value.add_attribute(Attribute::Bold);
        }
        table.add_row(vec![value, Cell::new(row.state).fg(color), Cell::new(row.frequency)]);
    }
    table
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label).fg(Color::Cyan).add_attribute(Attribute::Bold)
}

fn state_color(state: State) -> Color {
    match state {
        State::Selected => Color::Green,
        State::Possible => Color::White,
        State::Alternative => Color::Grey,
        State::Excluded => Color::DarkGrey,
        State::SelectedExcluded => Color::Red,
    }
}
