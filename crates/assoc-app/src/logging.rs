//! Logging setup using `tracing` and `tracing-subscriber`.
//!
//! Logs go to stderr so table and JSON output on stdout stay clean.
//! `RUST_LOG` wins over the verbosity flags when it is set.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Level for a `-v` count: warn by default, then info, debug, trace
pub fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn build_env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(verbosity: u8) -> anyhow::Result<()> {
    let layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(verbosity >= 2);

    tracing_subscriber::registry()
        .with(build_env_filter(level_for_verbosity(verbosity)))
        .with(layer)
        .try_init()?;
    Ok(())
}
