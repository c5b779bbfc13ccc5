//! Tokio codec for framelink frames.
//!
//! # Overview
//!
//! `FrameCodec` implements [`Decoder`] and [`Encoder`] so a byte stream can be
//! wrapped in `FramedRead`/`FramedWrite`. Decoding is an explicit two-state
//! machine:
//!
//! ```text
//! ┌────────────┐  8 header bytes, size > 0   ┌──────────┐  size bytes   ┌─────────┐
//! │ ReadHeader │────────────────────────────>│ ReadBody │──────────────>│ Deliver │
//! └────────────┘                             └──────────┘               └─────────┘
//!       │ ^          size == 0                                               │
//!       │ └──────────────────────────────────────────────────────────────────┘
//!       └──────────────────────────────> Deliver
//! ```
//!
//! A header with `size == 0` is delivered immediately; no body step runs.
//!
//! # DoS Protection
//!
//! A header announcing a body above `max_body_size` is rejected before any
//! body buffer is allocated.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{Message, MessageHeader, MessageId};
use framelink_core::constants::{DEFAULT_MAX_BODY_SIZE, HEADER_LEN};
use framelink_core::{Error, Result};

/// Decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState<T> {
    /// Waiting for a complete header.
    ReadHeader,

    /// Header received; waiting for `header.size` body bytes.
    ReadBody(MessageHeader<T>),
}

/// Codec for framelink frames tagged with `T`.
///
/// # Example
///
/// ```
/// use bytes::BytesMut;
/// use tokio_util::codec::{Decoder, Encoder};
/// use framelink_protocol::{FrameCodec, Message};
///
/// let mut codec = FrameCodec::<u32>::new();
/// let mut buffer = BytesMut::new();
///
/// let mut msg = Message::new(5u32);
/// msg.push(42u64);
/// codec.encode(msg.clone(), &mut buffer).unwrap();
///
/// assert_eq!(codec.decode(&mut buffer).unwrap(), Some(msg));
/// assert!(buffer.is_empty());
/// ```
#[derive(Debug)]
pub struct FrameCodec<T> {
    state: DecodeState<T>,
    max_body_size: usize,
}

impl<T: MessageId> FrameCodec<T> {
    pub fn new() -> Self {
        Self::with_max_body_size(DEFAULT_MAX_BODY_SIZE)
    }

    pub fn with_max_body_size(max_body_size: usize) -> Self {
        Self {
            state: DecodeState::ReadHeader,
            max_body_size,
        }
    }

    pub fn max_body_size(&self) -> usize {
        self.max_body_size
    }

    pub fn state(&self) -> DecodeState<T> {
        self.state
    }
}

impl<T: MessageId> Default for FrameCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: MessageId> Decoder for FrameCodec<T> {
    type Item = Message<T>;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        loop {
            match self.state {
                DecodeState::ReadHeader => {
                    if src.len() < HEADER_LEN {
                        src.reserve(HEADER_LEN - src.len());
                        return Ok(None);
                    }

                    let mut raw = [0u8; HEADER_LEN];
                    raw.copy_from_slice(&src[..HEADER_LEN]);
                    let header = MessageHeader::<T>::from_bytes(&raw)?;

                    let size = header.size as usize;
                    if size > self.max_body_size {
                        return Err(Error::BodyTooLarge {
                            size,
                            max: self.max_body_size,
                        });
                    }
                    src.advance(HEADER_LEN);

                    if size == 0 {
                        return Ok(Some(Message::from_parts(header, Vec::new())));
                    }
                    src.reserve(size.saturating_sub(src.len()));
                    self.state = DecodeState::ReadBody(header);
                }
                DecodeState::ReadBody(header) => {
                    let size = header.size as usize;
                    if src.len() < size {
                        return Ok(None);
                    }

                    let body = src.split_to(size).to_vec();
                    self.state = DecodeState::ReadHeader;
                    return Ok(Some(Message::from_parts(header, body)));
                }
            }
        }
    }
}

impl<T: MessageId> Encoder<Message<T>> for FrameCodec<T> {
    type Error = Error;

    fn encode(&mut self, item: Message<T>, dst: &mut BytesMut) -> Result<()> {
        <Self as Encoder<&Message<T>>>::encode(self, &item, dst)
    }
}

impl<T: MessageId> Encoder<&Message<T>> for FrameCodec<T> {
    type Error = Error;

    fn encode(&mut self, item: &Message<T>, dst: &mut BytesMut) -> Result<()> {
        if item.size() > self.max_body_size {
            return Err(Error::BodyTooLarge {
                size: item.size(),
                max: self.max_body_size,
            });
        }
        dst.reserve(HEADER_LEN + item.size());
        dst.put_slice(&item.header().to_bytes());
        dst.put_slice(item.body());
        Ok(())
    }
}
