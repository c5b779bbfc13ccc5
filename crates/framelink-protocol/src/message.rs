//! Tagged, length-prefixed binary messages.
//!
//! A [`Message`] is a [`MessageHeader`] (tag + body size) followed by a raw
//! byte body. Values are appended to and removed from the **tail** of the
//! body, so the body behaves like a stack:
//!
//! ```
//! use framelink_protocol::Message;
//!
//! let mut msg = Message::new(1u32);
//! msg.push(7u32).push(3.5f64);
//!
//! // Last in, first out
//! assert_eq!(msg.pop::<f64>().unwrap(), 3.5);
//! assert_eq!(msg.pop::<u32>().unwrap(), 7);
//! assert_eq!(msg.size(), 0);
//! ```
//!
//! Only plain-old-data values (`bytemuck::Pod`) can be pushed: no pointers,
//! no heap-owning containers. The raw bytes travel in the host's native
//! layout.

use bytemuck::Pod;
use std::fmt;
use std::mem::size_of;

use crate::MessageId;
use framelink_core::constants::{HEADER_LEN, TAG_LEN};
use framelink_core::{Error, Result};

/// Fixed-size frame header, sent ahead of every body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader<T> {
    pub id: T,
    pub size: u32,
}

impl<T: MessageId> MessageHeader<T> {
    pub fn new(id: T) -> Self {
        Self { id, size: 0 }
    }

    /// Wire form: tag then size, both native-endian, no padding.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut raw = [0u8; HEADER_LEN];
        raw[..TAG_LEN].copy_from_slice(&self.id.to_wire().to_ne_bytes());
        raw[TAG_LEN..].copy_from_slice(&self.size.to_ne_bytes());
        raw
    }

    /// Parse a header from its wire form.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownMessageId` if the tag does not map to a `T`.
    pub fn from_bytes(raw: &[u8; HEADER_LEN]) -> Result<Self> {
        let mut tag = [0u8; TAG_LEN];
        let mut size = [0u8; HEADER_LEN - TAG_LEN];
        tag.copy_from_slice(&raw[..TAG_LEN]);
        size.copy_from_slice(&raw[TAG_LEN..]);

        let tag = u32::from_ne_bytes(tag);
        let id = T::from_wire(tag).ok_or(Error::UnknownMessageId(tag))?;
        Ok(Self {
            id,
            size: u32::from_ne_bytes(size),
        })
    }
}

/// A tagged binary message.
///
/// `header().size` always equals `body().len()`; every mutation keeps the
/// two in step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message<T> {
    header: MessageHeader<T>,
    body: Vec<u8>,
}

impl<T: MessageId> Message<T> {
    /// Empty message with the given tag.
    pub fn new(id: T) -> Self {
        Self {
            header: MessageHeader::new(id),
            body: Vec::new(),
        }
    }

    /// Message carrying an already-encoded body.
    pub fn with_body(id: T, body: Vec<u8>) -> Self {
        let mut msg = Self {
            header: MessageHeader::new(id),
            body,
        };
        msg.sync_size();
        msg
    }

    pub(crate) fn from_parts(header: MessageHeader<T>, body: Vec<u8>) -> Self {
        debug_assert_eq!(header.size as usize, body.len());
        Self { header, body }
    }

    pub fn id(&self) -> T {
        self.header.id
    }

    pub fn set_id(&mut self, id: T) {
        self.header.id = id;
    }

    pub fn header(&self) -> &MessageHeader<T> {
        &self.header
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body length in bytes.
    pub fn size(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Append the raw bytes of `value` to the tail of the body.
    ///
    /// # Panics
    ///
    /// Panics if the body would grow past `u32::MAX` bytes.
    pub fn push<V: Pod>(&mut self, value: V) -> &mut Self {
        self.body.extend_from_slice(bytemuck::bytes_of(&value));
        self.sync_size();
        self
    }

    /// Remove the last `size_of::<V>()` bytes of the body and read them as `V`.
    ///
    /// # Errors
    ///
    /// Returns `Error::BodyUnderflow` if the body is shorter than `V`. The
    /// message is left untouched in that case.
    pub fn pop<V: Pod>(&mut self) -> Result<V> {
        let requested = size_of::<V>();
        let available = self.body.len();
        if requested > available {
            return Err(Error::BodyUnderflow {
                requested,
                available,
            });
        }

        let at = available - requested;
        let value = bytemuck::pod_read_unaligned(&self.body[at..]);
        self.body.truncate(at);
        self.sync_size();
        Ok(value)
    }

    fn sync_size(&mut self) {
        assert!(
            self.body.len() <= u32::MAX as usize,
            "message body exceeds u32::MAX bytes"
        );
        self.header.size = self.body.len() as u32;
    }
}

impl<T: fmt::Debug> fmt::Display for Message<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "id: {:?} size: {}", self.header.id, self.header.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Position {
        x: f32,
        y: f32,
        z: f32,
    }

    #[test]
    fn test_new_message_is_empty() {
        let msg = Message::new(9u32);
        assert_eq!(msg.id(), 9);
        assert_eq!(msg.size(), 0);
        assert_eq!(msg.header().size, 0);
    }

    #[test]
    fn test_push_updates_header_size() {
        let mut msg = Message::new(1u32);
        msg.push(1u8);
        assert_eq!(msg.header().size, 1);
        msg.push(2u64);
        assert_eq!(msg.header().size, 9);
        assert_eq!(msg.size(), 9);
    }

    #[test]
    fn test_pop_is_lifo() {
        let mut msg = Message::new(1u32);
        msg.push(1u16).push(2u32).push(3u64);

        assert_eq!(msg.pop::<u64>().unwrap(), 3);
        assert_eq!(msg.pop::<u32>().unwrap(), 2);
        assert_eq!(msg.pop::<u16>().unwrap(), 1);
        assert!(msg.is_empty());
        assert_eq!(msg.header().size, 0);
    }

    #[test]
    fn test_struct_round_trip() {
        let pos = Position {
            x: 1.0,
            y: -2.5,
            z: 1e6,
        };
        let mut msg = Message::new(4u32);
        msg.push(pos);
        assert_eq!(msg.size(), 12);
        assert_eq!(msg.pop::<Position>().unwrap(), pos);
    }

    #[test]
    fn test_pop_underflow_leaves_body_intact() {
        let mut msg = Message::new(1u32);
        msg.push(5u16);

        let err = msg.pop::<u64>().unwrap_err();
        assert!(matches!(
            err,
            Error::BodyUnderflow {
                requested: 8,
                available: 2
            }
        ));
        assert_eq!(msg.size(), 2);
        assert_eq!(msg.pop::<u16>().unwrap(), 5);
    }

    #[test]
    fn test_with_body_sets_size() {
        let msg = Message::with_body(3u32, vec![1, 2, 3, 4, 5]);
        assert_eq!(msg.header().size, 5);
        assert_eq!(msg.body(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_header_wire_form() {
        let header = MessageHeader { id: 0x0102_0304u32, size: 17 };
        let raw = header.to_bytes();
        assert_eq!(&raw[..4], &0x0102_0304u32.to_ne_bytes());
        assert_eq!(&raw[4..], &17u32.to_ne_bytes());
        assert_eq!(MessageHeader::<u32>::from_bytes(&raw).unwrap(), header);
    }

    #[test]
    fn test_header_unknown_tag() {
        let raw = MessageHeader { id: 300u32, size: 0 }.to_bytes();
        let result = MessageHeader::<u8>::from_bytes(&raw);
        assert!(matches!(result, Err(Error::UnknownMessageId(300))));
    }

    #[test]
    fn test_display() {
        let mut msg = Message::new(2u32);
        msg.push(1u32);
        assert_eq!(msg.to_string(), "id: 2 size: 4");
    }
}
