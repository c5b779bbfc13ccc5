//! Server endpoint.
//!
//! The server accepts TCP connections on a background reactor thread, runs
//! the handshake on each, and funnels every inbound frame into one shared
//! queue. The application drains that queue with [`Server::update`], which is
//! the only place frames reach [`ServerHooks::on_message`].
//!
//! # Architecture
//!
//! ```text
//! Client A ┐                      ┌──────────────────────┐
//!          │                      │ reactor thread       │
//! Client B ├──> TcpListener ────> │  accept loop         │
//!          │                      │  Connection tasks ───┼──> incoming queue
//! Client C ┘                      └──────────────────────┘          │
//!                                                                   ▼
//!                                       application thread: update() -> on_message()
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use framelink_network::{Connection, Server, ServerHooks};
//! use framelink_protocol::Message;
//!
//! struct Relay;
//!
//! impl ServerHooks<u32> for Relay {
//!     fn on_message(&self, server: &Server<u32>, client: &Arc<Connection<u32>>, message: Message<u32>) {
//!         // Forward to everyone else
//!         server.message_all_clients(message, Some(client));
//!     }
//! }
//!
//! let mut server = Server::new(60_000, Relay);
//! server.start()?;
//! loop {
//!     server.update(None, true);
//! }
//! # Ok::<(), framelink_network::NetError>(())
//! ```
//!
//! # Live Connections
//!
//! Approved connections are kept in a mutex-guarded set. Closed connections
//! are not removed when they close; they are pruned the next time a send or
//! broadcast finds them, and `on_client_disconnected` fires exactly once for
//! each.

use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::reactor::Reactor;
use crate::{Connection, ConnectionInfo, Incoming, NetError, Role, ServerHooks};
use framelink_core::constants::{
    DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT, FIRST_CONNECTION_ID,
};
use framelink_protocol::{Message, MessageId};

/// Configuration for the server endpoint
///
/// # Example
///
/// ```
/// use framelink_network::ServerConfig;
///
/// let config = ServerConfig {
///     bind_addr: "127.0.0.1:0".parse().unwrap(),
///     max_connections: 16,
///     ..ServerConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind_addr: SocketAddr,

    /// Maximum number of simultaneously open connections
    pub max_connections: usize,

    /// Largest frame body accepted from a client
    pub max_body_size: usize,

    /// Set TCP_NODELAY on accepted sockets
    pub nodelay: bool,
}

impl ServerConfig {
    /// Listen on every IPv4 interface at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            ..Self::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            nodelay: true,
        }
    }
}

/// State shared between the application-facing server and its reactor.
struct Shared<T: MessageId> {
    config: ServerConfig,
    hooks: Box<dyn ServerHooks<T>>,
    clients: Mutex<Vec<Arc<Connection<T>>>>,
    incoming: Arc<Incoming<T>>,
    next_id: AtomicU32,
}

impl<T: MessageId> Shared<T> {
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => self.admit(stream, addr),
                Err(e) => error!("New connection error: {}", e),
            }
        }
    }

    fn admit(self: &Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        debug!("Accepted new connection from {}", addr);

        let open = self.open_connections();
        if open >= self.config.max_connections {
            error!(
                addr = %addr,
                max_connections = self.config.max_connections,
                current_connections = open,
                "Connection rejected: maximum connections reached"
            );
            drop(stream);
            return;
        }

        if self.config.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
            }
        }

        let conn = Connection::new(Role::Server, addr);
        if !self.hooks.on_client_connected(&conn) {
            info!(addr = %addr, "Connection denied");
            conn.disconnect();
            return;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        conn.assign_id(id);
        self.clients.lock().push(Arc::clone(&conn));
        info!(id, addr = %addr, "Connection approved");

        let shared = Arc::clone(self);
        tokio::spawn(conn.run(
            stream,
            Arc::clone(&self.incoming),
            self.config.max_body_size,
            move |client: &Arc<Connection<T>>| shared.hooks.on_client_validated(client),
        ));
    }

    fn open_connections(&self) -> usize {
        self.clients
            .lock()
            .iter()
            .filter(|client| client.is_connected())
            .count()
    }
}

/// Server endpoint
///
/// # Connection Lifecycle
///
/// 1. `start()` binds and begins accepting on the reactor thread
/// 2. Each accepted socket goes through `on_client_connected`, gets the next
///    id (starting at 10000) and runs the handshake
/// 3. Validated connections deliver frames into the incoming queue
/// 4. `update()` hands queued frames to `on_message`
/// 5. `stop()` closes every connection and stops the reactor
///
/// # Thread Safety
///
/// `message_client`, `message_all_clients` and `update` take `&self` and may
/// be called from any application thread. None of them may be called from
/// inside an async task.
pub struct Server<T: MessageId> {
    shared: Arc<Shared<T>>,
    reactor: Option<Reactor>,
    local_addr: Option<SocketAddr>,
}

impl<T: MessageId> Server<T> {
    /// Server listening on `0.0.0.0:port`. Nothing happens until `start()`.
    pub fn new(port: u16, hooks: impl ServerHooks<T>) -> Self {
        Self::with_config(ServerConfig::with_port(port), hooks)
    }

    pub fn with_config(config: ServerConfig, hooks: impl ServerHooks<T>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                hooks: Box::new(hooks),
                clients: Mutex::new(Vec::new()),
                incoming: Arc::new(Incoming::new()),
                next_id: AtomicU32::new(FIRST_CONNECTION_ID),
            }),
            reactor: None,
            local_addr: None,
        }
    }

    /// Bind the listener and start the reactor thread.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The server is already running
    /// - The reactor thread cannot be created
    /// - The address is in use or cannot be bound
    pub fn start(&mut self) -> Result<(), NetError> {
        if self.reactor.is_some() {
            return Err(NetError::AlreadyRunning);
        }

        let reactor = Reactor::start("framelink-server")?;
        let bind_addr = self.shared.config.bind_addr;

        let listener = match reactor.block_on(TcpListener::bind(bind_addr))? {
            Ok(listener) => listener,
            Err(e) => {
                error!("[SERVER] Failed to bind {}: {}", bind_addr, e);
                return Err(NetError::BindFailed(bind_addr));
            }
        };
        let local_addr = listener.local_addr()?;

        reactor.spawn(Arc::clone(&self.shared).accept_loop(listener));

        info!(
            "[SERVER] Started on {} (max {} connections)",
            local_addr, self.shared.config.max_connections
        );
        self.local_addr = Some(local_addr);
        self.reactor = Some(reactor);
        Ok(())
    }

    /// Close the listener and every connection, then stop the reactor thread.
    /// Idempotent.
    pub fn stop(&mut self) {
        let Some(mut reactor) = self.reactor.take() else {
            return;
        };

        let clients = std::mem::take(&mut *self.shared.clients.lock());
        for client in &clients {
            client.disconnect();
        }
        reactor.stop();
        self.local_addr = None;

        info!("[SERVER] Stopped ({} connections closed)", clients.len());
    }

    pub fn is_running(&self) -> bool {
        self.reactor.as_ref().is_some_and(Reactor::is_running)
    }

    /// Address the listener is bound to, once started.
    ///
    /// Useful when binding to port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Dispatch queued inbound frames to `on_message`, oldest first.
    ///
    /// With `wait`, blocks until at least one frame is queued. Dispatches at
    /// most `max_messages` frames (`None` for no limit) and returns how many
    /// were dispatched.
    pub fn update(&self, max_messages: Option<usize>, wait: bool) -> usize {
        let incoming = &self.shared.incoming;
        if wait {
            incoming.wait();
        }

        let mut dispatched = 0;
        while max_messages.is_none_or(|max| dispatched < max) {
            let Some(owned) = incoming.pop_front() else {
                break;
            };
            if let Some(client) = owned.remote {
                self.shared.hooks.on_message(self, &client, owned.message);
                dispatched += 1;
            }
        }
        dispatched
    }

    /// Send `message` to one client.
    ///
    /// If the client has closed, it is removed from the live set and
    /// `on_client_disconnected` fires instead.
    pub fn message_client(&self, client: &Arc<Connection<T>>, message: Message<T>) {
        if client.is_connected() {
            client.send(message);
            return;
        }

        let removed = {
            let mut clients = self.shared.clients.lock();
            let before = clients.len();
            clients.retain(|c| !Arc::ptr_eq(c, client));
            clients.len() != before
        };
        if removed {
            info!(id = client.id(), "Removing client");
            self.shared.hooks.on_client_disconnected(client);
        }
    }

    /// Send `message` to every open client except `exclude`.
    ///
    /// Closed clients found during the sweep are pruned in one pass, then
    /// `on_client_disconnected` fires for each.
    pub fn message_all_clients(&self, message: Message<T>, exclude: Option<&Arc<Connection<T>>>) {
        let message = Arc::new(message);

        let closed = {
            let mut clients = self.shared.clients.lock();
            let mut closed = Vec::new();
            clients.retain(|client| {
                if !client.is_connected() {
                    closed.push(Arc::clone(client));
                    return false;
                }
                if !exclude.is_some_and(|skip| Arc::ptr_eq(skip, client)) {
                    client.send_shared(Arc::clone(&message));
                }
                true
            });
            closed
        };

        for client in &closed {
            info!(id = client.id(), "Removing client");
            self.shared.hooks.on_client_disconnected(client);
        }
    }

    /// Number of connections in the live set, including closed ones not yet
    /// pruned.
    pub fn connection_count(&self) -> usize {
        self.shared.clients.lock().len()
    }

    pub fn connections_info(&self) -> Vec<ConnectionInfo> {
        self.shared
            .clients
            .lock()
            .iter()
            .map(|client| client.info())
            .collect()
    }

    /// Inbound queue, for applications that drain it themselves.
    pub fn incoming(&self) -> &Incoming<T> {
        &self.shared.incoming
    }
}

impl<T: MessageId> Drop for Server<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    struct Silent;

    impl ServerHooks<u32> for Silent {
        fn on_message(&self, _: &Server<u32>, _: &Arc<Connection<u32>>, _: Message<u32>) {}
    }

    fn local_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            max_connections: 10,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 60_000);
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert!(config.nodelay);
    }

    #[rstest]
    #[case(0)]
    #[case(4242)]
    #[case(u16::MAX)]
    fn test_config_with_port(#[case] port: u16) {
        let config = ServerConfig::with_port(port);
        assert_eq!(config.bind_addr.port(), port);
        assert!(config.bind_addr.ip().is_unspecified());
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn test_start_and_stop() {
        let mut server = Server::with_config(local_config(), Silent);
        assert!(!server.is_running());

        server.start().unwrap();
        assert!(server.is_running());
        assert_ne!(server.local_addr().unwrap().port(), 0);

        server.stop();
        assert!(!server.is_running());
        assert!(server.local_addr().is_none());
        server.stop();
    }

    #[test]
    fn test_start_twice_fails() {
        let mut server = Server::with_config(local_config(), Silent);
        server.start().unwrap();
        assert!(matches!(server.start(), Err(NetError::AlreadyRunning)));
    }

    #[test]
    fn test_bind_conflict_reported() {
        let mut first = Server::with_config(local_config(), Silent);
        first.start().unwrap();

        let taken = ServerConfig {
            bind_addr: first.local_addr().unwrap(),
            ..local_config()
        };
        let mut second = Server::with_config(taken, Silent);
        assert!(matches!(second.start(), Err(NetError::BindFailed(_))));
        assert!(!second.is_running());
    }

    #[test]
    fn test_update_on_empty_queue() {
        let server = Server::with_config(local_config(), Silent);
        assert_eq!(server.update(None, false), 0);
        assert_eq!(server.connection_count(), 0);
        assert!(server.connections_info().is_empty());
    }
}
