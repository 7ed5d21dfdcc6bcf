//! Line-delimited JSON-RPC core.
//!
//! Requests are single-line JSON objects `{"id", "method", "params"}`;
//! responses echo the id with either `result` or `error`. An id of `-1`
//! marks a notification, which runs but is never answered.
//!
//! - [`registry`]: named handlers, registered per instance or statically
//! - [`coerce`]: argument fixup against declared parameter shapes
//! - [`dispatcher`]: frame text in, response frames out
//! - [`server`]: accept loop and connection bookkeeping

pub mod codec;
pub mod coerce;
pub mod dispatcher;
pub mod handler;
pub mod methods;
pub mod registry;
pub mod server;
pub mod types;

const REGISTRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::registry");
const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");

// Re-export commonly used types
pub use codec::CodecError;
pub use dispatcher::Dispatcher;
pub use handler::{
    Args, HandlerDescriptor, HandlerError, HandlerOwner, HandlerResult, HandlerSource, MethodDef,
    ParamSpec, ParamType, ReturnKind, StaticHandlerSource,
};
pub use methods::{Calculator, Diagnostics, DIAGNOSTICS_PREFIX};
pub use registry::MethodRegistry;
pub use server::{bind, Server, ServerState};
pub use types::{CallIntent, Response, RpcError, HANDLER_FAILED, METHOD_NOT_FOUND, NOTIFY_ID};
