//! Logging configuration and initialization for chainbbs.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::Result;

/// Parse log level string to tracing Level.
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize the logging system with the given configuration.
///
/// Sets up both console output and file logging.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let level = parse_level(&config.level);
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if let Some(parent) = Path::new(&config.file).parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let log_file = Arc::new(File::create(&config.file)?);
    let writer = std::io::stdout.and(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .with(filter)
        .init();

    Ok(())
}

/// Initialize console-only logging (for development/testing).
pub fn init_console_only(level: &str) {
    let level = parse_level(level);
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_target(true),
        )
        .with(filter)
        .init();
}
