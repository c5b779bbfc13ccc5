//! Application callbacks invoked by a [`Server`](crate::Server).

use std::sync::Arc;

use crate::{Connection, Server};
use framelink_protocol::{Message, MessageId};

/// Server lifecycle and message callbacks.
///
/// `on_client_connected` and `on_client_validated` run on the server's
/// reactor thread and must not block. `on_message` runs on whichever thread
/// calls [`Server::update`]. `on_client_disconnected` runs on the thread
/// whose send or broadcast discovered the closed connection.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use framelink_network::{Connection, Server, ServerHooks};
/// use framelink_protocol::Message;
///
/// struct Echo;
///
/// impl ServerHooks<u32> for Echo {
///     fn on_message(&self, server: &Server<u32>, client: &Arc<Connection<u32>>, message: Message<u32>) {
///         server.message_client(client, message);
///     }
/// }
///
/// let mut server = Server::new(60_000, Echo);
/// server.start().unwrap();
/// loop {
///     server.update(None, true);
/// }
/// ```
pub trait ServerHooks<T: MessageId>: Send + Sync + 'static {
    /// A socket was accepted. Return `false` to drop it before the handshake.
    fn on_client_connected(&self, client: &Arc<Connection<T>>) -> bool {
        let _ = client;
        true
    }

    /// The client answered the handshake correctly.
    fn on_client_validated(&self, client: &Arc<Connection<T>>) {
        let _ = client;
    }

    /// A closed connection was found and removed from the live set.
    fn on_client_disconnected(&self, client: &Arc<Connection<T>>) {
        let _ = client;
    }

    /// A frame arrived from `client`.
    fn on_message(&self, server: &Server<T>, client: &Arc<Connection<T>>, message: Message<T>);
}
