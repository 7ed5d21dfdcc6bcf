//! Command-line arguments for the `rpcline` binary.
//!
//! Every flag is optional; unset flags leave the environment-derived
//! [`ServerConfig`] value in place.

use clap::{Parser, ValueEnum};

use crate::config::{LogFormat, ServerConfig};
use crate::transport::TextEncoding;

/// Text encoding flag values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EncodingArg {
    /// UTF-8 text
    Utf8,
    /// ISO-8859-1, one byte per character
    Latin1,
}

impl From<EncodingArg> for TextEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Utf8 => TextEncoding::Utf8,
            EncodingArg::Latin1 => TextEncoding::Latin1,
        }
    }
}

/// Log format flag values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable single lines
    Compact,
    /// One JSON object per event
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

/// rpcline: line-delimited JSON-RPC server
#[derive(Parser, Debug)]
#[command(name = "rpcline")]
#[command(about = "Line-delimited JSON-RPC server with a named method registry")]
#[command(version)]
pub struct Cli {
    /// Address to listen on (host:port)
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Text encoding used on every connection
    #[arg(short, long, value_enum)]
    pub encoding: Option<EncodingArg>,

    /// Tracing filter, e.g. "debug" or "rpcline::transport=trace"
    #[arg(long)]
    pub log_filter: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatArg>,

    /// Prefix prepended to the calculator method names
    #[arg(short, long, default_value = "")]
    pub prefix: String,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Overrides `config` with every flag that was given.
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(listen) = &self.listen {
            config.listen = listen.clone();
        }
        if let Some(encoding) = self.encoding {
            config.encoding = encoding.into();
        }
        if let Some(filter) = &self.log_filter {
            config.log_filter = filter.clone();
        }
        if let Some(format) = self.log_format {
            config.log_format = format.into();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flags_keep_config() {
        let cli = Cli::try_parse_from(["rpcline"]).unwrap();
        let mut config = ServerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, ServerConfig::default());
        assert_eq!(cli.prefix, "");
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "rpcline",
            "--listen",
            "0.0.0.0:7000",
            "--encoding",
            "latin1",
            "--log-filter",
            "trace",
            "--log-format",
            "json",
            "--prefix",
            "calc.",
        ])
        .unwrap();
        let mut config = ServerConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.listen, "0.0.0.0:7000");
        assert_eq!(config.encoding, TextEncoding::Latin1);
        assert_eq!(config.log_filter, "trace");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(cli.prefix, "calc.");
    }

    #[test]
    fn unknown_encoding_rejected() {
        assert!(Cli::try_parse_from(["rpcline", "--encoding", "ebcdic"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
