//! JSON codec boundary.
//!
//! Turns frame text into a [`CallIntent`] and a [`Response`] back into text.
//! Also provides the structural conversion used when coercing arguments for
//! parameters declared with a concrete serde type.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::types::{CallIntent, Response, WireRequest};

/// Errors raised while decoding or encoding a message.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed request: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Decodes one request line (trailing whitespace, including `\n`, is allowed).
pub fn decode_request(line: &str) -> Result<CallIntent, CodecError> {
    let request: WireRequest = serde_json::from_str(line).map_err(CodecError::Malformed)?;
    Ok(request.into())
}

/// Encodes a response without the trailing delimiter.
pub fn encode_response(response: &Response) -> Result<String, CodecError> {
    serde_json::to_string(response).map_err(CodecError::Encode)
}

/// Splits a frame into its non-blank request lines.
///
/// A frame normally holds one request, but a peer that pipelines writes can
/// land several delimiter-terminated requests in the same read.
pub fn request_lines(frame: &str) -> impl Iterator<Item = &str> {
    frame
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
}

/// Round-trips a value through `T`, normalising it to the shape `T` serializes to.
pub fn convert_structured<T>(value: Value) -> Result<Value, serde_json::Error>
where
    T: DeserializeOwned + Serialize,
{
    let typed: T = serde_json::from_value(value)?;
    serde_json::to_value(typed)
}
