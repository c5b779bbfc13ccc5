//! Client and server endpoints for the framelink protocol.
//!
//! Each endpoint runs its socket I/O on one background thread and exposes a
//! synchronous API to application threads:
//!
//! - [`Client`]: one connection to a server, inbound frames in a queue
//! - [`Server`]: accepts many clients, dispatches inbound frames to
//!   [`ServerHooks`] from [`Server::update`]
//!
//! Every connection starts with a challenge/response handshake. Frames are
//! only exchanged after the client answers correctly.

pub mod client;
pub mod connection;
pub mod error;
pub mod hooks;
mod reactor;
pub mod server;

pub use client::{Client, ClientConfig};
pub use connection::{Connection, ConnectionInfo, Incoming, OwnedMessage, Role};
pub use error::NetError;
pub use hooks::ServerHooks;
pub use server::{Server, ServerConfig};
