//! rpcline: a line-delimited JSON-RPC server core.
//!
//! Clients send one JSON request per line over any byte stream; the server
//! resolves the method by name in a registry, fixes up the positional
//! arguments against the method's declared parameters and writes back one
//! response line per answered call.
//!
//! # Modules
//!
//! - [`transport`]: frame reassembly and connection lifecycle
//! - [`rpc`]: registry, dispatcher, server and built-in methods
//! - [`config`]: Runtime configuration (ServerConfig, LogFormat)
//! - [`error`]: Error types and codes (ServerError, ErrorCode)
//! - [`telemetry`]: tracing subscriber setup
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rpcline::rpc::{bind, Calculator, Server};
//! use rpcline::ServerConfig;
//!
//! # async fn demo() -> rpcline::Result<()> {
//! let config = ServerConfig::default();
//! let server = Server::new(&config);
//! server.register_handlers(Arc::new(Calculator::new()), "")?;
//! let listener = bind(&config.listen).await?;
//! server.serve(listener).await
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod rpc;
pub mod telemetry;
pub mod transport;

// Re-export commonly used types at crate root for convenience
pub use config::{LogFormat, ServerConfig};
pub use error::{ErrorCode, Result, ServerError};
pub use rpc::{MethodRegistry, Server};
pub use transport::{Connection, TextEncoding};
