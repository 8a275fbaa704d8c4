//! Command line arguments for the `assoc` explorer

use std::path::PathBuf;

use assoc_core::{ListboxSort, SelectMode};
use clap::{ArgAction, Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "assoc",
    version,
    about = "Load a table, apply selections and print every field's value states",
    long_about = "Load a CSV file or SQLite table into an associative session.\n\n\
                  Each --select is applied in order; afterwards every field is listed \n\
                  with each value marked selected, possible, alternative, excluded \n\
                  or selected-excluded."
)]
pub struct Cli {
    /// CSV file or SQLite database to load.
    #[arg(value_name = "SOURCE", required_unless_present = "config")]
    pub source: Option<PathBuf>,

    /// Table to read when SOURCE is a SQLite database.
    #[arg(long, value_name = "TABLE")]
    pub table: Option<String>,

    /// JSON load configuration (overrides SOURCE and --table).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Selection to apply, as FIELD=VALUE[,VALUE...]. Repeatable.
    #[arg(short, long = "select", value_name = "FIELD=VALUES", value_parser = parse_selection)]
    pub selections: Vec<SelectionArg>,

    /// How each --select combines with the field's current selection.
    #[arg(long, value_enum, default_value = "replace")]
    pub mode: ModeArg,

    /// Only print these fields. Repeatable; default prints every field.
    #[arg(short, long = "field", value_name = "FIELD")]
    pub fields: Vec<String>,

    /// Output format.
    #[arg(long, value_enum, default_value = "table")]
    pub format: FormatArg,

    /// Value order inside each listbox.
    #[arg(long, value_enum, default_value = "state")]
    pub sort: SortArg,

    /// Log more (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// One `--select FIELD=VALUES` argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionArg {
    pub field: String,
    pub values: Vec<String>,
}

fn parse_selection(raw: &str) -> Result<SelectionArg, String> {
    let (field, values) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE[,VALUE...], got '{raw}'"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in '{raw}'"));
    }

    // An empty value list is a valid Replace that clears the field
    let values = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    Ok(SelectionArg {
        field: field.to_string(),
        values,
    })
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModeArg {
    Replace,
    Toggle,
    Add,
    Remove,
}

impl From<ModeArg> for SelectMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Replace => SelectMode::Replace,
            ModeArg::Toggle => SelectMode::Toggle,
            ModeArg::Add => SelectMode::Add,
            ModeArg::Remove => SelectMode::Remove,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Table,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SortArg {
    Load,
    State,
    Text,
}

impl From<SortArg> for ListboxSort {
    fn from(sort: SortArg) -> Self {
        match sort {
            SortArg::Load => ListboxSort::LoadOrder,
            SortArg::State => ListboxSort::State,
            SortArg::Text => ListboxSort::Text,
        }
    }
}
