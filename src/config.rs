//! Server configuration module.
//!
//! Contains the runtime configuration for the rpcline server: listen
//! address, connection text encoding and logging output.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::transport::TextEncoding;

/// Default address the daemon listens on.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:53438";

/// Default tracing filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Returns the string representation of the format.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        }
    }

    /// Parses a log format from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "compact" | "text" => Some(LogFormat::Compact),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime configuration for the server.
///
/// This configuration is typically loaded from environment variables and
/// then overridden by command-line arguments at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on (`host:port`).
    pub listen: String,

    /// Text encoding used on every connection.
    pub encoding: TextEncoding,

    /// Tracing filter directive, e.g. `info` or `rpcline::transport=trace`.
    pub log_filter: String,

    /// Log output format.
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Creates a new ServerConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ServerConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `RPCLINE_LISTEN` - Listen address (`host:port`)
    /// - `RPCLINE_ENCODING` - Connection encoding (utf8, latin1)
    /// - `RPCLINE_LOG` - Tracing filter expression
    /// - `RPCLINE_LOG_FORMAT` - Log format (compact, json)
    ///
    /// Falls back to defaults for unset or unparseable variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(listen) = lookup("RPCLINE_LISTEN") {
            if !listen.trim().is_empty() {
                config.listen = listen.trim().to_string();
            }
        }

        if let Some(encoding) = lookup("RPCLINE_ENCODING") {
            if let Some(encoding) = TextEncoding::parse(&encoding) {
                config.encoding = encoding;
            }
        }

        if let Some(filter) = lookup("RPCLINE_LOG") {
            if !filter.trim().is_empty() {
                config.log_filter = filter;
            }
        }

        if let Some(format) = lookup("RPCLINE_LOG_FORMAT") {
            if let Some(format) = LogFormat::parse(&format) {
                config.log_format = format;
            }
        }

        config
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.listen.parse::<SocketAddr>().is_err() && !looks_like_host_port(&self.listen) {
            return Some(format!("listen address must be host:port, got {:?}", self.listen));
        }
        if self.log_filter.trim().is_empty() {
            return Some("log filter must not be empty".to_string());
        }
        None
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            encoding: TextEncoding::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

/// Accepts `name:port` forms that need DNS resolution, such as `localhost:9000`.
fn looks_like_host_port(value: &str) -> bool {
    match value.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
