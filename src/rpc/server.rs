//! RPC server: owns the registry and every live connection.
//!
//! Streams come either from [`Server::serve`], a plain TCP accept loop, or
//! from an external listener through [`Server::accept`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::transport::{Connection, TextEncoding};

use super::dispatcher::Dispatcher;
use super::handler::{HandlerSource, StaticHandlerSource};
use super::registry::MethodRegistry;
use super::SERVER_TARGET;

const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Lifecycle of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Created, nothing accepted yet.
    Idle,
    /// Accepting and serving connections.
    Serving,
    /// Stopped for good; new streams are refused.
    Stopped,
}

/// Shared server handle. Clones refer to the same server.
#[derive(Debug, Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

#[derive(Debug)]
struct ServerInner {
    dispatcher: Dispatcher,
    encoding: TextEncoding,
    state: Mutex<ServerState>,
    connections: Mutex<HashMap<u64, Arc<Connection>>>,
    next_id: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl Server {
    /// Creates a server using the connection settings from `config`.
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_encoding(config.encoding)
    }

    /// Creates a server whose connections speak `encoding`.
    pub fn with_encoding(encoding: TextEncoding) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(ServerInner {
                dispatcher: Dispatcher::new(Arc::new(MethodRegistry::new())),
                encoding,
                state: Mutex::new(ServerState::Idle),
                connections: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                shutdown,
            }),
        }
    }

    pub fn registry(&self) -> &Arc<MethodRegistry> {
        self.inner.dispatcher.registry()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// Registers the methods of `target` under `prefix`, bound to that instance.
    pub fn register_handlers<T: HandlerSource>(&self, target: Arc<T>, prefix: &str) -> Result<usize> {
        self.registry().register_instance(target, prefix)
    }

    /// Registers the associated functions of `T` under `prefix`.
    pub fn register_static<T: StaticHandlerSource>(&self, prefix: &str) -> Result<usize> {
        self.registry().register_static::<T>(prefix)
    }

    pub fn state(&self) -> ServerState {
        *self.inner.lock_state()
    }

    /// Wraps an already accepted stream in a connection.
    ///
    /// Returns `None` (and drops the stream, closing it) once the server has
    /// been stopped.
    pub fn accept<S>(&self, stream: S, address: impl Into<String>) -> Option<Arc<Connection>>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let mut state = self.inner.lock_state();
        if *state == ServerState::Stopped {
            debug!(target: SERVER_TARGET, "refusing stream after stop");
            return None;
        }
        *state = ServerState::Serving;

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let owner = Arc::downgrade(&self.inner);
        let connection = Connection::spawn(
            id,
            address,
            stream,
            self.inner.encoding,
            self.inner.dispatcher.clone(),
            Box::new(move |id| release_connection(&owner, id)),
        );

        let mut connections = self.inner.lock_connections();
        connections.insert(id, Arc::clone(&connection));
        // The peer may already be gone, in which case the hook ran before
        // the insert above.
        if !connection.is_connected() {
            connections.remove(&id);
        }
        Some(connection)
    }

    /// Accepts TCP clients until [`Server::stop`] is called.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        {
            let mut state = self.inner.lock_state();
            if *state == ServerState::Stopped {
                return Err(ServerError::server_stopped());
            }
            *state = ServerState::Serving;
        }

        let mut shutdown = self.inner.shutdown.subscribe();
        match listener.local_addr() {
            Ok(address) => info!(target: SERVER_TARGET, %address, "listening"),
            Err(_) => info!(target: SERVER_TARGET, "listening"),
        }

        loop {
            tokio::select! {
                biased;
                _ = async { let _ = shutdown.wait_for(|stopped| *stopped).await; } => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        if let Err(error) = stream.set_nodelay(true) {
                            debug!(target: SERVER_TARGET, error = %error, "set_nodelay failed");
                        }
                        self.accept(stream, peer.to_string());
                    }
                    Err(error) => {
                        warn!(target: SERVER_TARGET, error = %error, "accept error");
                        tokio::time::sleep(ERROR_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);
        info!(target: SERVER_TARGET, "listener released");
        Ok(())
    }

    /// Stops accepting, kills every open connection and releases the listener.
    pub fn stop(&self) {
        {
            let mut state = self.inner.lock_state();
            if *state == ServerState::Stopped {
                return;
            }
            *state = ServerState::Stopped;
        }
        self.inner.shutdown.send_replace(true);

        // Kill outside the lock: each kill calls back into release_connection.
        let open: Vec<Arc<Connection>> = self
            .inner
            .lock_connections()
            .drain()
            .map(|(_, connection)| connection)
            .collect();
        info!(target: SERVER_TARGET, connections = open.len(), "stopping server");
        for connection in open {
            connection.kill();
        }
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock_connections().len()
    }

    /// Ids of the currently open connections, ascending.
    pub fn connection_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.inner.lock_connections().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl ServerInner {
    fn lock_state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_connections(&self) -> MutexGuard<'_, HashMap<u64, Arc<Connection>>> {
        self.connections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn release_connection(owner: &Weak<ServerInner>, id: u64) {
    if let Some(inner) = owner.upgrade() {
        inner.lock_connections().remove(&id);
    }
}

/// Binds a TCP listener, mapping failures to [`ServerError`].
pub async fn bind(address: &str) -> Result<TcpListener> {
    TcpListener::bind(address)
        .await
        .map_err(|error| ServerError::bind_failed(address, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use tokio::io::{duplex, AsyncReadExt};

    #[test]
    fn server_starts_idle() {
        let server = Server::new(&ServerConfig::default());
        assert_eq!(server.state(), ServerState::Idle);
        assert_eq!(server.connection_count(), 0);
        assert!(server.registry().is_empty());
    }

    #[tokio::test]
    async fn accept_moves_to_serving() {
        let server = Server::with_encoding(TextEncoding::Utf8);
        let (_client, stream) = duplex(64);
        let connection = server.accept(stream, "test").unwrap();
        assert_eq!(server.state(), ServerState::Serving);
        assert_eq!(server.connection_ids(), vec![connection.id()]);
    }

    #[tokio::test]
    async fn ids_are_not_reused() {
        let server = Server::with_encoding(TextEncoding::Utf8);
        let (_a, stream_a) = duplex(64);
        let first = server.accept(stream_a, "a").unwrap();
        first.kill();
        let (_b, stream_b) = duplex(64);
        let second = server.accept(stream_b, "b").unwrap();
        assert!(second.id() > first.id());
        assert_eq!(server.connection_ids(), vec![second.id()]);
    }

    #[tokio::test]
    async fn stop_kills_connections_and_refuses_new_ones() {
        let server = Server::with_encoding(TextEncoding::Utf8);
        let (mut client, stream) = duplex(64);
        let connection = server.accept(stream, "test").unwrap();

        server.stop();
        assert_eq!(server.state(), ServerState::Stopped);
        assert!(!connection.is_connected());
        assert_eq!(server.connection_count(), 0);

        // The client side observes end of stream once the writer is closed.
        let mut buf = Vec::new();
        client.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());

        let (_other, stream) = duplex(64);
        assert!(server.accept(stream, "late").is_none());
    }

    #[tokio::test]
    async fn serve_after_stop_fails() {
        let server = Server::with_encoding(TextEncoding::Utf8);
        server.stop();
        let listener = bind("127.0.0.1:0").await.unwrap();
        let err = server.serve(listener).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ServerStopped);
    }

    #[tokio::test]
    async fn bind_reports_bad_address() {
        let err = bind("127.0.0.1:99999").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::BindFailed);
    }
}
