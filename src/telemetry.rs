//! Tracing subscriber setup for the server binary.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{subscriber::SetGlobalDefaultError, Subscriber};
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, ServerConfig};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Proof that the global subscriber is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(String),
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global tracing subscriber on first use.
///
/// Later calls return a handle without touching global state, whatever
/// config they pass.
pub fn initialise(config: &ServerConfig) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|_| TelemetryHandle)
}

/// Parses a filter directive the way [`initialise`] does.
pub fn parse_filter(directive: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(directive).map_err(|error| TelemetryError::Filter(error.to_string()))
}

fn install_subscriber(config: &ServerConfig) -> Result<(), TelemetryError> {
    let filter = parse_filter(&config.log_filter)?;

    // Logs go to stderr; stdout stays free for whatever embeds the binary.
    let builder = |filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
