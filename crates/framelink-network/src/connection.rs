//! One TCP peer: handshake, then the frame read/write cycle.
//!
//! # Lifecycle
//!
//! ```text
//! accepted / connected
//!        │
//!        ▼
//!   Handshake ── mismatch or I/O error ──> Closed
//!        │
//!        ▼ validated
//!   ┌─────────────────────────────┐
//!   │ reader: ReadHeader ⇄ ReadBody ──> incoming queue
//!   │ writer: Idle → WriteHeader → WriteBody → (next or Idle)
//!   └─────────────────────────────┘
//!        │ any read/write error, peer EOF, or disconnect()
//!        ▼
//!     Closed (socket dropped, never reused)
//! ```
//!
//! The reader and writer run as two branches of one task on the endpoint's
//! reactor. Whichever ends first ends the session and the socket is dropped
//! with it.
//!
//! # Outbound Ordering
//!
//! `send()` appends to a private queue. Only the push that finds the queue
//! empty wakes the writer; the writer drains the queue front to back and
//! pops a message only after its last byte is written. So at most one write
//! cycle is active per connection and frames are never interleaved.

use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Notify;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use framelink_core::constants::HANDSHAKE_LEN;
use framelink_core::{Result, TsQueue};
use framelink_protocol::handshake::{self, Challenge};
use framelink_protocol::{FrameCodec, Message, MessageId};

/// Which side of the handshake a connection plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Accepted by a server; issues the challenge.
    Server,
    /// Opened by a client; answers the challenge.
    Client,
}

/// Inbound message paired with the connection it arrived on.
///
/// `remote` is always set on a server and always `None` on a client, which
/// only ever talks to one peer.
#[derive(Debug, Clone)]
pub struct OwnedMessage<T: MessageId> {
    pub remote: Option<Arc<Connection<T>>>,
    pub message: Message<T>,
}

impl<T: MessageId> fmt::Display for OwnedMessage<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.message, f)
    }
}

/// Queue every connection of one endpoint delivers into.
pub type Incoming<T> = TsQueue<OwnedMessage<T>>;

/// Connection metadata snapshot.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub id: u32,
    pub remote_addr: SocketAddr,
    pub connected_at: DateTime<Utc>,
    pub uptime: chrono::Duration,
    pub validated: bool,
    pub connected: bool,
}

/// Writer state.
enum WriteState<T> {
    Idle,
    WriteHeader(Arc<Message<T>>),
    WriteBody(Arc<Message<T>>),
}

/// A single peer connection.
///
/// Shared behind an `Arc`: the server's live set, in-flight I/O and queued
/// inbound messages may all hold it at once. The socket itself is owned by
/// the connection's task and is dropped as soon as the connection closes.
#[derive(Debug)]
pub struct Connection<T: MessageId> {
    role: Role,

    /// Server-assigned id; 0 until the server approves the connection
    id: AtomicU32,

    remote_addr: SocketAddr,
    connected_at: DateTime<Utc>,

    /// Server role only
    challenge: Option<Challenge>,

    outbound: TsQueue<Arc<Message<T>>>,
    write_ready: Notify,

    open: AtomicBool,
    validated: AtomicBool,
    closed: CancellationToken,
}

impl<T: MessageId> Connection<T> {
    pub(crate) fn new(role: Role, remote_addr: SocketAddr) -> Arc<Self> {
        let challenge = match role {
            Role::Server => Some(Challenge::generate()),
            Role::Client => None,
        };

        Arc::new(Self {
            role,
            id: AtomicU32::new(0),
            remote_addr,
            connected_at: Utc::now(),
            challenge,
            outbound: TsQueue::new(),
            write_ready: Notify::new(),
            open: AtomicBool::new(true),
            validated: AtomicBool::new(false),
            closed: CancellationToken::new(),
        })
    }

    pub fn id(&self) -> u32 {
        self.id.load(Ordering::Acquire)
    }

    pub(crate) fn assign_id(&self, id: u32) {
        self.id.store(id, Ordering::Release);
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.connected_at
    }

    /// `true` once the handshake has succeeded.
    pub fn is_validated(&self) -> bool {
        self.validated.load(Ordering::Acquire)
    }

    /// `true` until the socket is closed, for any reason.
    pub fn is_connected(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Number of messages waiting to be written.
    pub fn pending(&self) -> usize {
        self.outbound.count()
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id(),
            remote_addr: self.remote_addr,
            connected_at: self.connected_at,
            uptime: self.uptime(),
            validated: self.is_validated(),
            connected: self.is_connected(),
        }
    }

    /// Queue `message` for delivery to the peer.
    ///
    /// Messages are written in the order they are queued. Messages queued
    /// before the handshake completes are held until it does. Dropped
    /// silently if the connection is already closed.
    pub fn send(&self, message: Message<T>) {
        self.send_shared(Arc::new(message));
    }

    pub(crate) fn send_shared(&self, message: Arc<Message<T>>) {
        if !self.is_connected() {
            trace!(id = self.id(), "Send on closed connection dropped");
            return;
        }
        if self.outbound.push_back(message) {
            self.write_ready.notify_one();
        }
    }

    /// Close the socket. Pending reads and writes fail and the connection's
    /// task ends. Idempotent.
    pub fn disconnect(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            debug!(id = self.id(), addr = %self.remote_addr, "Closing connection");
        }
        self.closed.cancel();
    }

    /// Drive the connection until it closes.
    ///
    /// `on_validated` runs once, on the reactor, right after a server-side
    /// handshake succeeds and before the first frame is read.
    pub(crate) async fn run<F>(
        self: Arc<Self>,
        stream: TcpStream,
        incoming: Arc<Incoming<T>>,
        max_body_size: usize,
        on_validated: F,
    ) where
        F: FnOnce(&Arc<Self>) + Send,
    {
        let closed = self.closed.clone();
        let outcome = tokio::select! {
            _ = closed.cancelled() => Ok(()),
            result = self.session(stream, &incoming, max_body_size, on_validated) => result,
        };

        if let Err(e) = outcome {
            warn!(
                id = self.id(),
                addr = %self.remote_addr,
                error = %e,
                "Connection failed"
            );
        }
        self.disconnect();
    }

    async fn session<F>(
        self: &Arc<Self>,
        mut stream: TcpStream,
        incoming: &Incoming<T>,
        max_body_size: usize,
        on_validated: F,
    ) -> Result<()>
    where
        F: FnOnce(&Arc<Self>) + Send,
    {
        match self.challenge {
            Some(challenge) => {
                stream
                    .write_all(&handshake::to_wire(challenge.value()))
                    .await?;
                let response = read_handshake(&mut stream).await?;
                if let Err(e) = challenge.verify(response) {
                    info!(id = self.id(), addr = %self.remote_addr, "Client failed validation");
                    return Err(e);
                }

                self.validated.store(true, Ordering::Release);
                info!(id = self.id(), addr = %self.remote_addr, "Client validated");
                on_validated(self);
            }
            None => {
                let challenge = read_handshake(&mut stream).await?;
                stream
                    .write_all(&handshake::to_wire(handshake::respond(challenge)))
                    .await?;
                self.validated.store(true, Ordering::Release);
                debug!(addr = %self.remote_addr, "Handshake answered");
            }
        }

        let (reader, writer) = stream.into_split();
        tokio::select! {
            result = self.read_frames(reader, incoming, max_body_size) => result,
            result = self.write_frames(writer) => result,
        }
    }

    async fn read_frames(
        self: &Arc<Self>,
        reader: OwnedReadHalf,
        incoming: &Incoming<T>,
        max_body_size: usize,
    ) -> Result<()> {
        let codec = FrameCodec::<T>::with_max_body_size(max_body_size);
        let mut frames = FramedRead::new(reader, codec);

        while let Some(frame) = frames.next().await {
            let message = frame?;
            trace!(id = self.id(), message = %message, "Frame received");

            let remote = match self.role {
                Role::Server => Some(Arc::clone(self)),
                Role::Client => None,
            };
            incoming.push_back(OwnedMessage { remote, message });
        }

        debug!(id = self.id(), addr = %self.remote_addr, "Peer closed connection");
        Ok(())
    }

    async fn write_frames(&self, mut writer: OwnedWriteHalf) -> Result<()> {
        let mut state = WriteState::Idle;
        loop {
            state = match state {
                WriteState::Idle => {
                    self.write_ready.notified().await;
                    self.next_write()
                }
                WriteState::WriteHeader(message) => {
                    writer.write_all(&message.header().to_bytes()).await?;
                    if message.is_empty() {
                        self.finish_write()
                    } else {
                        WriteState::WriteBody(message)
                    }
                }
                WriteState::WriteBody(message) => {
                    writer.write_all(message.body()).await?;
                    self.finish_write()
                }
            };
        }
    }

    fn next_write(&self) -> WriteState<T> {
        match self.outbound.front() {
            Some(message) => WriteState::WriteHeader(message),
            None => WriteState::Idle,
        }
    }

    fn finish_write(&self) -> WriteState<T> {
        self.outbound.pop_front();
        self.next_write()
    }
}

async fn read_handshake(stream: &mut TcpStream) -> Result<u64> {
    let mut raw = [0u8; HANDSHAKE_LEN];
    stream.read_exact(&mut raw).await?;
    Ok(handshake::from_wire(raw))
}
