use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

fn env_filter(debug: bool) -> EnvFilter {
    let default_directive = if debug {
        "blah=debug,transcript=debug,tower_http=debug,info"
    } else {
        "blah=info,tower_http=info,warn"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Log to stderr. Used by the relay and the line client.
pub fn init_stderr(debug: bool) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter(debug))
        .init();
}

/// Log to a file, leaving the terminal to the TUI.
pub fn init_file(path: &Path, debug: bool) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {:?}", path))?;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file)),
        )
        .with(env_filter(debug))
        .init();
    Ok(())
}
