//! Client endpoint.
//!
//! A client owns at most one connection. `connect()` resolves and connects
//! synchronously, then hands the socket to a background reactor thread which
//! answers the server's challenge and runs the frame cycle. Inbound frames
//! land in [`Client::incoming`], which the application drains at its own
//! pace.
//!
//! # Design Principles
//!
//! - **Synchronous surface**: every method is a plain call; the async work
//!   stays on the reactor thread
//! - **One peer**: inbound frames carry no origin, since it is always the
//!   server
//! - **Failure is a state**: a dropped connection shows up as
//!   `is_connected() == false`, never as a panic or a callback
//!
//! # Timeout Handling
//!
//! The TCP connect runs under [`ClientConfig::connect_timeout`] (default:
//! 3000ms); name resolution is left to the system resolver's own limits. A connect that does
//! not finish in time returns [`NetError::ConnectTimeout`]. Once connected,
//! reads and writes have no timeout; a silent server is detected only when
//! the socket reports an error or EOF.
//!
//! # Example Usage
//!
//! ```no_run
//! use framelink_network::Client;
//! use framelink_protocol::Message;
//!
//! let mut client = Client::<u32>::new();
//! client.connect("127.0.0.1", 60_000)?;
//!
//! let mut ping = Message::new(2);
//! ping.push(42u64);
//! client.send(ping);
//!
//! client.incoming().wait();
//! if let Some(reply) = client.incoming().pop_front() {
//!     println!("Received {}", reply);
//! }
//! # Ok::<(), framelink_network::NetError>(())
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpStream, lookup_host};
use tracing::{debug, error, info, trace, warn};

use crate::reactor::Reactor;
use crate::{Connection, Incoming, NetError, Role};
use framelink_core::constants::{DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_MAX_BODY_SIZE};
use framelink_protocol::{Message, MessageId};

/// Configuration for the client endpoint
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// How long to wait for the TCP connection to be established
    pub connect_timeout: Duration,

    /// Largest frame body accepted from the server
    pub max_body_size: usize,

    /// Set TCP_NODELAY on the socket
    pub nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            nodelay: true,
        }
    }
}

/// Client endpoint
///
/// # Connection Lifecycle
///
/// 1. `connect()` starts a reactor thread, resolves and connects
/// 2. The reactor reads the server's challenge and writes the answer;
///    `is_validated()` turns `true`
/// 3. Frames flow both ways: `send()` queues outbound, `incoming()` collects
///    inbound
/// 4. `disconnect()`, a new `connect()`, or the server closing ends the
///    connection; dropping the client does the same
///
/// # Thread Safety
///
/// `send`, `incoming`, `is_connected` and `is_validated` take `&self` and may
/// be shared across threads. `connect` and `disconnect` need `&mut self` and
/// block the caller; neither may be called from inside an async task.
pub struct Client<T: MessageId> {
    config: ClientConfig,
    reactor: Option<Reactor>,
    connection: Option<Arc<Connection<T>>>,
    incoming: Arc<Incoming<T>>,
}

impl<T: MessageId> Client<T> {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config,
            reactor: None,
            connection: None,
            incoming: Arc::new(Incoming::new()),
        }
    }

    /// Connect to `host:port`, replacing any existing connection.
    ///
    /// Returns once the TCP connection is established; the handshake
    /// completes in the background. Use [`Client::is_validated`] to observe
    /// it. Messages sent before then are held and flushed after it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The host does not resolve
    /// - The connection is refused or times out
    /// - The reactor thread cannot be created
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), NetError> {
        self.disconnect();

        let reactor = Reactor::start("framelink-client")?;
        let connect_timeout = self.config.connect_timeout;

        let stream = match reactor.block_on(open_stream(host, port, connect_timeout))? {
            Ok(stream) => stream,
            Err(e) => {
                error!("[CLIENT] Connection to {}:{} failed: {}", host, port, e);
                return Err(e);
            }
        };

        if self.config.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                warn!("[CLIENT] Failed to set TCP_NODELAY: {}", e);
            }
        }

        let remote_addr = stream.peer_addr()?;
        let conn = Connection::new(Role::Client, remote_addr);
        reactor.spawn(Arc::clone(&conn).run(
            stream,
            Arc::clone(&self.incoming),
            self.config.max_body_size,
            |_: &Arc<Connection<T>>| {},
        ));

        info!("[CLIENT] Connected to {}", remote_addr);
        self.connection = Some(conn);
        self.reactor = Some(reactor);
        Ok(())
    }

    /// Close the connection and stop the reactor thread. Idempotent.
    ///
    /// Frames already in the incoming queue stay there.
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.disconnect();
            info!("[CLIENT] Disconnected from {}", conn.remote_addr());
        }
        if let Some(mut reactor) = self.reactor.take() {
            reactor.stop();
        }
    }

    /// `true` while the socket is open. Turns `false` on its own when the
    /// server closes the connection.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|conn| conn.is_connected())
    }

    /// `true` once the server's challenge has been answered.
    pub fn is_validated(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|conn| conn.is_connected() && conn.is_validated())
    }

    /// Queue `message` for the server. Does nothing when not connected.
    pub fn send(&self, message: Message<T>) {
        match &self.connection {
            Some(conn) if conn.is_connected() => conn.send(message),
            _ => trace!("[CLIENT] Send while disconnected dropped"),
        }
    }

    pub fn incoming(&self) -> &Incoming<T> {
        &self.incoming
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.connection.as_ref().map(|conn| conn.remote_addr())
    }
}

impl<T: MessageId> Default for Client<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MessageId> Drop for Client<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

async fn open_stream(
    host: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<TcpStream, NetError> {
    let target = format!("{}:{}", host, port);
    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|_| NetError::Resolve(target.clone()))?
        .collect();
    if addrs.is_empty() {
        return Err(NetError::Resolve(target));
    }
    debug!("[CLIENT] {} resolved to {:?}", target, addrs);

    match tokio::time::timeout(connect_timeout, TcpStream::connect(&addrs[..])).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(NetError::ConnectTimeout(connect_timeout.as_millis() as u64)),
    }
}
