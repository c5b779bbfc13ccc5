//! Wire protocol for framelink: tagged messages, frame codec and handshake.
//!
//! # Components
//!
//! - [`MessageId`]: fixed-width tag trait (plus the [`message_ids!`] helper)
//! - [`Message`]: header + body with LIFO `push`/`pop` of plain-old-data values
//! - [`FrameCodec`]: tokio-util codec for `[tag][size][body]` frames
//! - [`handshake`]: challenge/response exchanged before any frame

pub mod codec;
pub mod handshake;
pub mod id;
pub mod message;

pub use codec::{DecodeState, FrameCodec};
pub use handshake::{Challenge, scramble};
pub use id::MessageId;
pub use message::{Message, MessageHeader};
