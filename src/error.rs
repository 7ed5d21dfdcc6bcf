//! Error types for the rpcline server.
//!
//! Configuration errors raised while registering handlers or starting the
//! server. Call errors travel over the wire as [`crate::rpc::RpcError`] and
//! connection faults as [`crate::transport::ConnectionError`]; neither is
//! represented here.

use std::fmt;

/// Error codes for failures raised synchronously to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Handler name prefix contains whitespace.
    /// Trigger: `register_handlers(target, "my prefix")`.
    InvalidPrefix,

    /// A method name is already registered.
    /// Trigger: two handler sources exposing the same prefixed name.
    DuplicateHandler,

    /// Listener could not be bound.
    /// Trigger: address in use, permission denied, unresolvable host.
    BindFailed,

    /// Configuration value is out of range or malformed.
    /// Trigger: bad listen address or log filter.
    InvalidConfig,

    /// The server has already been stopped.
    /// Trigger: calling `serve` after `stop`.
    ServerStopped,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidPrefix => "INVALID_PREFIX",
            ErrorCode::DuplicateHandler => "DUPLICATE_HANDLER",
            ErrorCode::BindFailed => "BIND_FAILED",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::ServerStopped => "SERVER_STOPPED",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::InvalidPrefix => "Handler name prefix must not contain whitespace",
            ErrorCode::DuplicateHandler => "Method name is already handled by another source",
            ErrorCode::BindFailed => "Failed to bind the listening socket",
            ErrorCode::InvalidConfig => "Server configuration is invalid",
            ErrorCode::ServerStopped => "Server has been stopped and cannot serve again",
        }
    }

    /// Returns a recovery hint suggesting how to resolve this error.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCode::InvalidPrefix => {
                "Use a prefix without spaces, tabs or newlines (e.g., 'math.' instead of 'math ')"
            }
            ErrorCode::DuplicateHandler => {
                "Register the second source under a distinct prefix, \
                 or rename one of the conflicting methods"
            }
            ErrorCode::BindFailed => {
                "Check that no other process is listening on the address, \
                 or pick another port with --listen"
            }
            ErrorCode::InvalidConfig => {
                "Fix the offending flag or RPCLINE_* environment variable and restart"
            }
            ErrorCode::ServerStopped => "Create a new server instance instead of reusing a stopped one",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for server setup operations.
#[derive(Debug)]
pub struct ServerError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message with context.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ServerError {
    /// Creates a new ServerError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new ServerError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an INVALID_PREFIX error.
    pub fn invalid_prefix(prefix: &str) -> Self {
        Self::new(
            ErrorCode::InvalidPrefix,
            format!("Prefix string can not contain any whitespace: {:?}", prefix),
        )
    }

    /// Creates a DUPLICATE_HANDLER error naming the original owner.
    pub fn duplicate_handler(name: &str, owner: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::DuplicateHandler,
            format!("The method '{}' is already handled by {}", name, owner),
        )
    }

    /// Creates a BIND_FAILED error.
    pub fn bind_failed(address: &str, source: std::io::Error) -> Self {
        Self::with_source(
            ErrorCode::BindFailed,
            format!("Failed to bind listener at {}: {}", address, source),
            source,
        )
    }

    /// Creates an INVALID_CONFIG error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidConfig, reason)
    }

    /// Creates a SERVER_STOPPED error.
    pub fn server_stopped() -> Self {
        Self::new(ErrorCode::ServerStopped, "Server is stopped")
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}. Recovery: {}",
            self.code,
            self.message,
            self.code.recovery_hint()
        )
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using ServerError.
pub type Result<T> = std::result::Result<T, ServerError>;
