//! Property-based tests for message and frame invariants.
//!
//! These tests use proptest to generate random values and byte splits and
//! verify that push/pop ordering, header sizing, framing and the handshake
//! hold for every input.

use bytes::BytesMut;
use framelink_protocol::handshake::respond;
use framelink_protocol::{Challenge, FrameCodec, Message, scramble};
use proptest::prelude::*;
use tokio_util::codec::{Decoder, Encoder};

/// One pushable value of a randomly chosen width.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I64(i64),
}

fn any_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<u8>().prop_map(Value::U8),
        any::<u16>().prop_map(Value::U16),
        any::<u32>().prop_map(Value::U32),
        any::<u64>().prop_map(Value::U64),
        any::<i64>().prop_map(Value::I64),
    ]
}

fn push(msg: &mut Message<u32>, value: Value) {
    match value {
        Value::U8(v) => msg.push(v),
        Value::U16(v) => msg.push(v),
        Value::U32(v) => msg.push(v),
        Value::U64(v) => msg.push(v),
        Value::I64(v) => msg.push(v),
    };
}

/// Pop a value of the same width as `like`.
fn pop_like(msg: &mut Message<u32>, like: Value) -> Value {
    match like {
        Value::U8(_) => Value::U8(msg.pop().unwrap()),
        Value::U16(_) => Value::U16(msg.pop().unwrap()),
        Value::U32(_) => Value::U32(msg.pop().unwrap()),
        Value::U64(_) => Value::U64(msg.pop().unwrap()),
        Value::I64(_) => Value::I64(msg.pop().unwrap()),
    }
}

proptest! {
    /// Property: values come back in reverse push order, unchanged.
    #[test]
    fn prop_pop_reverses_push(values in prop::collection::vec(any_value(), 0..32)) {
        let mut msg = Message::new(1u32);
        for value in &values {
            push(&mut msg, *value);
        }

        for expected in values.iter().rev() {
            prop_assert_eq!(pop_like(&mut msg, *expected), *expected);
        }
        prop_assert!(msg.is_empty());
    }

    /// Property: header size tracks the body length after every push and pop.
    #[test]
    fn prop_header_size_matches_body(values in prop::collection::vec(any_value(), 1..32)) {
        let mut msg = Message::new(1u32);
        for value in &values {
            push(&mut msg, *value);
            prop_assert_eq!(msg.header().size as usize, msg.body().len());
        }
        for value in values.iter().rev() {
            pop_like(&mut msg, *value);
            prop_assert_eq!(msg.header().size as usize, msg.body().len());
        }
    }

    /// Property: a frame stream decodes identically however it is chunked.
    #[test]
    fn prop_decode_is_split_independent(
        bodies in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..8),
        chunk in 1usize..17,
    ) {
        let sent: Vec<Message<u32>> = bodies
            .into_iter()
            .enumerate()
            .map(|(i, body)| Message::with_body(i as u32, body))
            .collect();

        let mut wire = BytesMut::new();
        let mut encoder = FrameCodec::<u32>::new();
        for msg in &sent {
            encoder.encode(msg, &mut wire).unwrap();
        }

        let mut decoder = FrameCodec::<u32>::new();
        let mut buffer = BytesMut::new();
        let mut received = Vec::new();
        for piece in wire.chunks(chunk) {
            buffer.extend_from_slice(piece);
            while let Some(msg) = decoder.decode(&mut buffer).unwrap() {
                received.push(msg);
            }
        }

        prop_assert_eq!(received, sent);
        prop_assert!(buffer.is_empty());
    }

    /// Property: a conforming client always passes the handshake.
    #[test]
    fn prop_conforming_response_accepted(value in any::<u64>()) {
        prop_assert!(Challenge::from_value(value).verify(respond(value)).is_ok());
    }

    /// Property: any other answer is rejected.
    #[test]
    fn prop_wrong_response_rejected(value in any::<u64>(), answer in any::<u64>()) {
        prop_assume!(answer != scramble(value));
        prop_assert!(Challenge::from_value(value).verify(answer).is_err());
    }
}
