//! Message tag abstraction.
//!
//! Every frame starts with a fixed-width tag chosen by the embedding
//! application. The protocol layer only needs to move that tag to and from
//! its 4-byte wire form and compare it, so any small `Copy` type works.

use std::fmt;
use std::hash::Hash;

/// A fixed-width, comparable message tag.
///
/// The wire form is always a `u32`. Tags that do not map back to a value
/// (`from_wire` returns `None`) are rejected by the decoder.
pub trait MessageId: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Raw value written to the wire.
    fn to_wire(self) -> u32;

    /// Map a raw wire value back to a tag.
    fn from_wire(raw: u32) -> Option<Self>;
}

impl MessageId for u32 {
    fn to_wire(self) -> u32 {
        self
    }

    fn from_wire(raw: u32) -> Option<Self> {
        Some(raw)
    }
}

impl MessageId for u16 {
    fn to_wire(self) -> u32 {
        u32::from(self)
    }

    fn from_wire(raw: u32) -> Option<Self> {
        u16::try_from(raw).ok()
    }
}

impl MessageId for u8 {
    fn to_wire(self) -> u32 {
        u32::from(self)
    }

    fn from_wire(raw: u32) -> Option<Self> {
        u8::try_from(raw).ok()
    }
}

/// Declare a `#[repr(u32)]` tag enum and implement [`MessageId`] for it.
///
/// ```
/// use framelink_protocol::{MessageId, message_ids};
///
/// message_ids! {
///     pub enum GameMsg {
///         ServerAccept = 0,
///         ServerPing = 2,
///     }
/// }
///
/// assert_eq!(GameMsg::ServerPing.to_wire(), 2);
/// assert_eq!(GameMsg::from_wire(0), Some(GameMsg::ServerAccept));
/// assert_eq!(GameMsg::from_wire(1), None);
/// ```
#[macro_export]
macro_rules! message_ids {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        $vis enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl $crate::MessageId for $name {
            fn to_wire(self) -> u32 {
                self as u32
            }

            fn from_wire(raw: u32) -> Option<Self> {
                match raw {
                    $(v if v == $value => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}
