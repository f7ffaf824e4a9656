//! Structured logging setup
//!
//! Provides JSON-formatted and human-readable logging with optional file
//! output. Console logs go to stderr so they never interleave with the chat
//! transcript on stdout.

use crate::config::LoggingConfig;
use anyhow::Result;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the event filter for `level`
///
/// `RUST_LOG` takes precedence when set. Otherwise events from this crate
/// are kept at `level` and everything else at `warn`.
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    Ok(EnvFilter::try_new(format!(
        "warn,polyglot_messenger={}",
        level.to_lowercase()
    ))?)
}

/// Initialize logging based on configuration
///
/// # Arguments
///
/// * `config` - Logging configuration
///
/// # Errors
///
/// Returns an error if the level is not a valid filter, the log file cannot
/// be opened, or a global subscriber is already installed.
///
/// # Examples
///
/// ```no_run
/// use polyglot_messenger::config::LoggingConfig;
/// use polyglot_messenger::logging::init_logging;
///
/// let config = LoggingConfig {
///     level: "debug".to_string(),
///     json_format: false,
///     file_path: None,
/// };
/// init_logging(&config).unwrap();
/// ```
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(build_filter(&config.level)?);

    let file = match &config.file_path {
        Some(path) => Some(Arc::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => None,
    };

    if config.json_format {
        let console = fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr);
        let file_layer = file.map(|f| fmt::layer().json().with_current_span(true).with_writer(f));
        registry.with(console).with(file_layer).try_init()?;
    } else {
        let console = fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_writer(std::io::stderr);
        let file_layer = file.map(|f| {
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .with_writer(f)
        });
        registry.with(console).with(file_layer).try_init()?;
    }

    Ok(())
}
