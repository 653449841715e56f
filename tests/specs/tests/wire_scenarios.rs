// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Wire-frame scenarios exercised from outside the `ssm-wire` crate, using
//! only its public surface: the documented byte layout (headerLength(4) +
//! messageType(32) + schemaVersion(4) + createdDate(8) + sequenceNumber(8)
//! + flags(8) + messageId(16) + payloadDigest(32) + payloadType(4) +
//! payloadLength(4)) plus `AgentMessage::encode`/`decode`.

use bytes::Bytes;
use proptest::prelude::*;
use sha2::{Digest, Sha256};
use ssm_wire::{AgentMessage, MessageType, PayloadType, FLAG_SYN, HEADER_LENGTH};
use uuid::Uuid;

const MESSAGE_ID_OFFSET: usize = 64;
const MESSAGE_ID_LEN: usize = 16;

#[test]
fn message_id_is_written_with_halves_reversed_on_the_wire() {
    let id = Uuid::parse_str("dd01e56b-ff48-483e-a508-b5f073f31b16").expect("fixture uuid is well-formed");
    let msg = AgentMessage::new(
        MessageType::AGENT_JOB,
        1,
        1_700_000_000,
        0,
        FLAG_SYN,
        id,
        PayloadType::Parameter.as_u32(),
        Bytes::from_static(b"{}"),
    );

    let encoded = msg.encode().expect("frame encodes");
    let canonical = id.into_bytes();
    let wire_id = &encoded[MESSAGE_ID_OFFSET..MESSAGE_ID_OFFSET + MESSAGE_ID_LEN];

    // The low 8 canonical bytes come first on the wire, then the high 8.
    assert_eq!(&wire_id[0..8], &canonical[8..16]);
    assert_eq!(&wire_id[8..16], &canonical[0..8]);

    // Decoding recovers the original, non-reversed UUID.
    let decoded = AgentMessage::decode(encoded).expect("frame decodes");
    assert_eq!(decoded.message_id, id);
}

#[test]
fn encode_recomputes_the_payload_digest_independently() {
    let payload = b"integration payload bytes".to_vec();
    let msg = AgentMessage::new(
        MessageType::AGENT_JOB_REPLY,
        1,
        1_700_000_001,
        3,
        0,
        Uuid::new_v4(),
        PayloadType::Output.as_u32(),
        Bytes::from(payload.clone()),
    );

    let encoded = msg.encode().expect("frame encodes");
    let decoded = AgentMessage::decode(encoded).expect("frame decodes");

    let mut hasher = Sha256::new();
    hasher.update(&payload);
    let expected: [u8; 32] = hasher.finalize().into();
    assert_eq!(decoded.payload_digest, expected);
}

#[test]
fn total_framed_length_matches_header_length_plus_payload() {
    let payload = Bytes::from_static(b"fixed-length-check");
    let msg = AgentMessage::new(
        MessageType::CONTROL_CHANNEL_READY,
        1,
        1_700_000_002,
        0,
        0,
        Uuid::new_v4(),
        PayloadType::Flag.as_u32(),
        payload.clone(),
    );

    let encoded = msg.encode().expect("frame encodes");
    assert_eq!(encoded.len(), HEADER_LENGTH as usize + 4 + payload.len());
}

proptest! {
    /// Arbitrary well-formed frames round-trip through encode/decode with
    /// every field intact, including the reversed-halves message id and the
    /// recomputed digest.
    #[test]
    fn decode_of_encode_is_identity(
        message_type in "[A-Za-z_]{1,32}",
        schema_version in any::<u32>(),
        created_date in 1u64..u64::MAX,
        sequence_number in any::<i64>(),
        flags in any::<u64>(),
        payload in proptest::collection::vec(any::<u8>(), 0..2048),
    ) {
        let msg = AgentMessage::new(
            message_type,
            schema_version,
            created_date,
            sequence_number,
            flags,
            Uuid::new_v4(),
            PayloadType::Output.as_u32(),
            Bytes::from(payload),
        );

        let encoded = msg.encode().expect("generated frame is within field limits");
        let decoded = AgentMessage::decode(encoded).expect("well-formed frame decodes");
        prop_assert_eq!(decoded, msg);
    }
}
