//! Wire-level constants shared by every framelink peer.
//!
//! # Connection Layout
//!
//! ```text
//! server ──[challenge: 8 bytes]──> client
//! server <──[response: 8 bytes]─── client
//! ... then frames in both directions:
//! [tag: 4 bytes][size: 4 bytes][body: size bytes]
//! ```
//!
//! All multi-byte values are written in the host's native byte order.
//! Both peers must therefore share the same endianness.

/// Width of the handshake challenge and of the response, in bytes.
pub const HANDSHAKE_LEN: usize = 8;

/// Width of the message tag on the wire, in bytes.
pub const TAG_LEN: usize = 4;

/// Width of the body size field on the wire, in bytes.
pub const SIZE_LEN: usize = 4;

/// Total width of a frame header, in bytes.
pub const HEADER_LEN: usize = TAG_LEN + SIZE_LEN;

/// First id handed out by a server to an approved connection.
///
/// Ids start well above zero so they never collide with small
/// application-level identifiers carried inside message bodies.
pub const FIRST_CONNECTION_ID: u32 = 10_000;

/// Default upper bound on a single frame body (8 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

/// Default number of simultaneous connections a server accepts.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 60_000;

/// Default client connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3_000;

/// Bit patterns used by the handshake scramble.
///
/// These are fixed for the lifetime of the protocol. Changing any of them
/// makes a peer incompatible with every peer built before the change.
pub mod scramble {
    pub const INPUT_MASK: u64 = 0xDEAD_BEEF_C0DE_CAFE;
    pub const HIGH_NIBBLES: u64 = 0xF0F0_F0F0_F0F0;
    pub const LOW_MIX: u64 = 0x00F1_3EAC_6F35;
    pub const OUTPUT_MASK: u64 = 0x0050_0913_261A;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_len() {
        assert_eq!(HEADER_LEN, 8);
    }

    #[test]
    fn test_first_connection_id() {
        assert_eq!(FIRST_CONNECTION_ID, 10_000);
    }
}
