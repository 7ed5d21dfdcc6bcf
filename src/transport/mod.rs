//! Byte-stream side of the server.
//!
//! Reassembles fragmented reads into frames, owns each connection's
//! lifecycle and writes responses back.

mod connection;
mod encoding;
mod errors;
mod frame_reader;

pub use self::connection::{Connection, DisconnectHook};
pub use self::encoding::TextEncoding;
pub use self::errors::ConnectionError;
pub use self::frame_reader::{FrameReader, DELIMITER, INITIAL_BUFFER_SIZE, MAX_BUFFER_SIZE};

const CONNECTION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
