//! stderr tracing with a reloadable level filter.
//!
//! stdout carries protocol frames only, so every log line goes to stderr.

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload};

/// Swaps the active level at runtime (`logging/setLevel`).
pub type LevelSetter = Box<dyn Fn(Level) -> Result<()>>;

fn filter_for(level: Level) -> EnvFilter {
    EnvFilter::default().add_directive(LevelFilter::from_level(level).into())
}

/// Install the global subscriber. `directive` is an `EnvFilter` directive
/// such as `info` or `kotlin_mcp_server=debug`; an unparsable one falls back
/// to `info`.
pub fn init_tracing(directive: &str) -> Result<LevelSetter> {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| filter_for(Level::INFO));
    let (filter, handle) = reload::Layer::new(filter);
    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(Box::new(move |level| {
        handle.reload(filter_for(level)).context("Failed to reload log filter")
    }))
}

/// Map an MCP log level (RFC 5424 names) onto a tracing level.
pub fn parse_mcp_level(level: &str) -> Option<Level> {
    match level.to_ascii_lowercase().as_str() {
        "debug" => Some(Level::DEBUG),
        "info" | "notice" => Some(Level::INFO),
        "warning" | "warn" => Some(Level::WARN),
        "error" | "critical" | "alert" | "emergency" => Some(Level::ERROR),
        _ => None,
    }
}
