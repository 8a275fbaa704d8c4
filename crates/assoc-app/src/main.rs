//! Command line explorer for associative selection sessions

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use assoc_core::{AssociationIndex, SelectMode, Session, SessionSettings};
use assoc_data::{open_loader, LoadConfig, SessionLayout};

mod cli;
mod logging;
mod render;

use crate::cli::{Cli, FormatArg};

fn load_config(cli: &Cli) -> Result<LoadConfig> {
    if let Some(path) = &cli.config {
        return LoadConfig::from_json_file(path)
            .with_context(|| format!("failed to read load configuration {}", path.display()));
    }

    let source = cli.source.clone().context("no source given")?;
    let mut config = LoadConfig::new(source);
    if cli.table.is_some() {
        config.table = cli.table.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose)?;

    let config = load_config(&cli)?;
    let loader = open_loader(config)?;
    info!(source = loader.source_name(), "Starting associative session");

    let settings = SessionSettings {
        default_sort: cli.sort.into(),
        ..SessionSettings::default()
    };
    let session = Session::with_settings(AssociationIndex::empty(), settings);
    session.load_from(loader.as_ref()).await?;

    let _subscription = session.subscribe_fn(|event| {
        debug!(
            field = %event.resolved.name,
            sequence = event.sequence,
            counts = ?event.resolved.counts(),
            "field changed"
        );
    });

    let mode: SelectMode = cli.mode.into();
    for selection in &cli.selections {
        session
            .select(&selection.field, &selection.values, mode)
            .with_context(|| format!("cannot select {}={}", selection.field, selection.values.join(",")))?;
    }

    let mut layout = SessionLayout::from_session(&session, session.settings().default_sort);
    if !cli.fields.is_empty() {
        let wanted = &cli.fields;
        layout.retain_fields(|name| wanted.iter().any(|f| f == name));
    }

    match cli.format {
        FormatArg::Table => render::print_layout(&layout),
        FormatArg::Json => println!("{}", layout.to_json_pretty()?),
    }
    Ok(())
}
