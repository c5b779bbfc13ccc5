//! Connection handshake.
//!
//! Before any frame is exchanged the server sends an 8-byte challenge. The
//! client answers with `scramble(challenge)`; the server compares the answer
//! with its own precomputed value and drops the socket on mismatch.
//!
//! ```text
//! Server                                  Client
//!   │ ── challenge (8 bytes) ─────────────> │
//!   │                                       │ response = scramble(challenge)
//!   │ <───────────── response (8 bytes) ──  │
//!   │ response == expected ? validated : close
//! ```
//!
//! # Security
//!
//! The scramble is a fixed, unkeyed bit shuffle. It only tells the server that
//! the peer speaks this protocol; it provides no authentication, integrity or
//! confidentiality.

use chrono::Utc;

use framelink_core::constants::{HANDSHAKE_LEN, scramble as masks};
use framelink_core::{Error, Result};

/// Deterministic transform applied to the challenge by both peers.
pub fn scramble(input: u64) -> u64 {
    let out = input ^ masks::INPUT_MASK;
    let out = ((out & masks::HIGH_NIBBLES) >> 6) | ((out & masks::LOW_MIX) << 2);
    !(out ^ masks::OUTPUT_MASK)
}

/// Client side: the answer to send back for `challenge`.
pub fn respond(challenge: u64) -> u64 {
    scramble(challenge)
}

/// Encode a handshake value for the wire (native byte order).
pub fn to_wire(value: u64) -> [u8; HANDSHAKE_LEN] {
    value.to_ne_bytes()
}

/// Decode a handshake value from the wire (native byte order).
pub fn from_wire(raw: [u8; HANDSHAKE_LEN]) -> u64 {
    u64::from_ne_bytes(raw)
}

/// Server-side challenge together with the answer it expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Challenge {
    value: u64,
    expected: u64,
}

impl Challenge {
    /// Challenge seeded from the current wall-clock time in nanoseconds.
    pub fn generate() -> Self {
        let now = Utc::now();
        let nanos = now
            .timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros().wrapping_mul(1_000));
        Self::from_value(nanos as u64)
    }

    pub fn from_value(value: u64) -> Self {
        Self {
            value,
            expected: scramble(value),
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn expected(&self) -> u64 {
        self.expected
    }

    /// Check the peer's answer.
    ///
    /// # Errors
    ///
    /// Returns `Error::HandshakeRejected` if `response` is not the expected value.
    pub fn verify(&self, response: u64) -> Result<()> {
        if response == self.expected {
            Ok(())
        } else {
            Err(Error::HandshakeRejected {
                expected: self.expected,
                actual: response,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(0xDEAD_BEEF_C0DE_CAFE)]
    #[case(u64::MAX)]
    fn test_conforming_response_verifies(#[case] value: u64) {
        let challenge = Challenge::from_value(value);
        assert!(challenge.verify(respond(value)).is_ok());
    }

    #[test]
    fn test_scramble_is_deterministic() {
        assert_eq!(scramble(12_345), scramble(12_345));
    }

    #[test]
    fn test_scramble_is_not_identity() {
        for value in [0u64, 1, 42, 1 << 40, u64::MAX] {
            assert_ne!(scramble(value), value);
        }
    }

    #[test]
    fn test_echoed_challenge_rejected() {
        let challenge = Challenge::from_value(0x0123_4567_89AB_CDEF);
        let result = challenge.verify(challenge.value());
        assert!(matches!(result, Err(Error::HandshakeRejected { .. })));
    }

    #[test]
    fn test_generated_challenges_differ_over_time() {
        let first = Challenge::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = Challenge::generate();
        assert_ne!(first.value(), second.value());
    }

    #[test]
    fn test_wire_round_trip() {
        let value = 0x0102_0304_0506_0708;
        assert_eq!(from_wire(to_wire(value)), value);
    }
}
