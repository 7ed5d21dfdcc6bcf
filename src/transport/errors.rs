//! Connection-level failures. Each one ends exactly one connection.

use std::io;

use thiserror::Error;

use super::TextEncoding;
use crate::rpc::CodecError;

/// Reasons a connection is killed.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("peer closed the connection")]
    Closed,
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
    #[error("frame exceeds the {limit} byte receive limit")]
    FrameTooLarge { limit: usize },
    #[error("text is not valid {encoding}")]
    InvalidText { encoding: TextEncoding },
    #[error("protocol violation: {0}")]
    Protocol(#[from] CodecError),
}

impl ConnectionError {
    /// Returns true for ordinary hang-ups, as opposed to misbehaving peers.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ConnectionError::Closed)
            || matches!(
                self,
                ConnectionError::Read(e) | ConnectionError::Write(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionReset
                            | io::ErrorKind::BrokenPipe
                            | io::ErrorKind::UnexpectedEof
                    )
            )
    }
}
