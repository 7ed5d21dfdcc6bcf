//! Dispatcher: frame text in, response frames out.

use std::sync::Arc;

use serde_json::Value;
use tracing::{trace, warn};

use super::codec::{decode_request, encode_response, request_lines, CodecError};
use super::coerce::fixup_args;
use super::handler::{Args, HandlerDescriptor, ReturnKind};
use super::registry::MethodRegistry;
use super::types::{CallIntent, Response, RpcError, NOTIFY_ID};
use super::DISPATCH_TARGET;

/// Resolves calls through the registry and shapes their outcome.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<MethodRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<MethodRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<MethodRegistry> {
        &self.registry
    }

    /// Processes one frame and returns the encoded responses to write back.
    ///
    /// A request that cannot be decoded is a protocol violation: the caller
    /// is expected to drop the connection. Requests decoded before the bad
    /// one have already run and their responses are discarded with it.
    pub fn handle_frame(&self, frame: &str) -> Result<Vec<String>, CodecError> {
        let mut replies = Vec::new();
        for line in request_lines(frame) {
            let intent = decode_request(line)?;
            if let Some(response) = self.execute(intent) {
                replies.push(encode_response(&response)?);
            }
        }
        Ok(replies)
    }

    /// Runs one call.
    ///
    /// Returns `None` for a notification to a registered method, whatever
    /// its outcome. An unknown method is always answered, notification or not.
    pub fn execute(&self, intent: CallIntent) -> Option<Response> {
        let CallIntent { id, method, args } = intent;
        let Some(descriptor) = self.registry.lookup(&method) else {
            trace!(target: DISPATCH_TARGET, method = %method, "unknown method");
            return Some(Response::error(id, RpcError::method_not_found(&method)));
        };

        let response = run(&descriptor, id, &method, args);
        if id == NOTIFY_ID {
            trace!(target: DISPATCH_TARGET, method = %method, "notification handled");
            return None;
        }
        Some(response)
    }
}

fn run(descriptor: &HandlerDescriptor, id: i64, method: &str, args: Vec<Value>) -> Response {
    let outcome = fixup_args(&descriptor.params, args)
        .and_then(|args| descriptor.invoke(&Args::new(args)));

    match outcome {
        Ok(result) => match descriptor.returns {
            ReturnKind::Void => Response::void(id),
            ReturnKind::Value => Response::result(id, result),
        },
        Err(error) => {
            warn!(
                target: DISPATCH_TARGET,
                method,
                error = %error,
                "handler failed"
            );
            Response::error(id, RpcError::handler_failed(method, &error.message))
        }
    }
}
