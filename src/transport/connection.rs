//! One client connection: read loop, write-back channel and kill switch.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::rpc::Dispatcher;

use super::{ConnectionError, FrameReader, TextEncoding, CONNECTION_TARGET};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Invoked once with the connection id when the connection dies.
pub type DisconnectHook = Box<dyn FnOnce(u64) + Send>;

/// A live client connection.
///
/// Frames are processed one at a time: the next read is only issued after
/// every response to the current frame has been written.
pub struct Connection {
    id: u64,
    address: String,
    encoding: TextEncoding,
    connected: AtomicBool,
    writer: tokio::sync::Mutex<Option<BoxedWriter>>,
    killed: watch::Sender<bool>,
    on_disconnect: Mutex<Option<DisconnectHook>>,
}

impl Connection {
    /// Wraps `stream` and starts its read loop on the current tokio runtime.
    pub fn spawn<S>(
        id: u64,
        address: impl Into<String>,
        stream: S,
        encoding: TextEncoding,
        dispatcher: Dispatcher,
        on_disconnect: DisconnectHook,
    ) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let writer: BoxedWriter = Box::new(writer);
        let (killed, killed_rx) = watch::channel(false);
        let connection = Arc::new(Self {
            id,
            address: address.into(),
            encoding,
            connected: AtomicBool::new(true),
            writer: tokio::sync::Mutex::new(Some(writer)),
            killed,
            on_disconnect: Mutex::new(Some(on_disconnect)),
        });
        info!(
            target: CONNECTION_TARGET,
            id,
            address = %connection.address,
            "client connected"
        );
        tokio::spawn(read_loop(
            Arc::clone(&connection),
            reader,
            killed_rx,
            dispatcher,
        ));
        connection
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Writes one response frame, appending the delimiter if missing.
    ///
    /// Returns false if the connection is gone or the write failed; a failed
    /// write kills the connection.
    pub async fn write(&self, text: &str) -> bool {
        if !self.is_connected() {
            return false;
        }
        trace!(target: CONNECTION_TARGET, id = self.id, tx = text, "write");

        let mut bytes = match self.encoding.encode(text) {
            Ok(bytes) => bytes,
            Err(error) => {
                self.fail(error);
                return false;
            }
        };
        if bytes.last() != Some(&b'\n') {
            bytes.push(b'\n');
        }

        // A peer that stops reading must not keep a killed connection alive.
        let mut killed = self.killed.subscribe();
        let result = tokio::select! {
            biased;
            _ = async { let _ = killed.wait_for(|killed| *killed).await; } => return false,
            result = self.write_bytes(&bytes) => result,
        };

        match result {
            Ok(true) => true,
            Ok(false) => false,
            Err(error) => {
                self.fail(ConnectionError::Write(error));
                false
            }
        }
    }

    async fn write_bytes(&self, bytes: &[u8]) -> std::io::Result<bool> {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Ok(false);
        };
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(true)
    }

    /// Closes the connection. Later calls do nothing.
    pub fn kill(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        self.killed.send_replace(true);
        info!(
            target: CONNECTION_TARGET,
            id = self.id,
            address = %self.address,
            "client disconnected"
        );
        let hook = self
            .on_disconnect
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(hook) = hook {
            hook(self.id);
        }
    }

    fn fail(&self, error: ConnectionError) {
        if error.is_disconnect() {
            debug!(target: CONNECTION_TARGET, id = self.id, error = %error, "connection lost");
        } else {
            warn!(target: CONNECTION_TARGET, id = self.id, error = %error, "dropping connection");
        }
        self.kill();
    }

    async fn close_writer(&self) {
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(error) = writer.shutdown().await {
                trace!(target: CONNECTION_TARGET, id = self.id, error = %error, "shutdown failed");
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("encoding", &self.encoding)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

async fn read_loop<S>(
    connection: Arc<Connection>,
    mut reader: ReadHalf<S>,
    mut killed: watch::Receiver<bool>,
    dispatcher: Dispatcher,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let mut frames = FrameReader::new(connection.encoding);

    'read: loop {
        let read = tokio::select! {
            biased;
            _ = async { let _ = killed.wait_for(|killed| *killed).await; } => break,
            read = reader.read(frames.spare()) => read,
        };

        let frame = match read.map_err(ConnectionError::Read).and_then(|n| frames.advance(n)) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(error) => {
                connection.fail(error);
                break;
            }
        };
        trace!(target: CONNECTION_TARGET, id = connection.id, rx = %frame, "frame");

        match dispatcher.handle_frame(&frame) {
            Ok(replies) => {
                for reply in replies {
                    if !connection.write(&reply).await {
                        break 'read;
                    }
                }
            }
            Err(error) => {
                connection.fail(ConnectionError::Protocol(error));
                break;
            }
        }
    }

    connection.close_writer().await;
}
