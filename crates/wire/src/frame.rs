// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fixed-layout `AgentMessage` binary frame (spec §4.5 / §6).
//!
//! Byte offsets, all multi-byte integers big-endian:
//!
//! ```text
//! [HL u32][MessageType 32B ASCII][SchemaVersion u32][CreatedDate u64]
//! [SequenceNumber i64][Flags u64][MessageId 16B][PayloadDigest 32B]
//! [PayloadType u32][PayloadLength u32][Payload ...]
//! ```
//!
//! Total framed size is `120 + payload.len()`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Byte offset of the `payloadLength` field — also the value every encoded
/// frame's `headerLength` field carries.
pub const HEADER_LENGTH: u32 = 116;

const MESSAGE_TYPE_LEN: usize = 32;
const MESSAGE_ID_LEN: usize = 16;
const DIGEST_LEN: usize = 32;
/// Total header size: `HEADER_LENGTH` (the `payloadLength` field offset) plus
/// the 4-byte `payloadLength` field itself.
const OFFSET_PAYLOAD: usize = HEADER_LENGTH as usize + 4;

/// SYN bit of the `flags` header field.
pub const FLAG_SYN: u64 = 1 << 0;
/// FIN bit of the `flags` header field.
pub const FLAG_FIN: u64 = 1 << 1;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame too short: need at least {need} bytes, have {have}")]
    TooShort { need: usize, have: usize },
    #[error("headerLength must be zero on receipt only if the frame is malformed; got 0")]
    ZeroHeaderLength,
    #[error("messageType must not be empty")]
    EmptyMessageType,
    #[error("createdDate must not be zero")]
    ZeroCreatedDate,
    #[error("payloadLength header ({declared}) does not match actual payload bytes ({actual})")]
    PayloadLengthMismatch { declared: u32, actual: usize },
    #[error("messageType {len} bytes exceeds the 32-byte field")]
    MessageTypeTooLong { len: usize },
}

/// A decoded (or about-to-be-encoded) control-channel frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentMessage {
    pub message_type: String,
    pub schema_version: u32,
    pub created_date: u64,
    pub sequence_number: i64,
    pub flags: u64,
    pub message_id: Uuid,
    /// SHA-256 of `payload`. Set automatically by [`AgentMessage::encode`];
    /// carried as-is (not re-verified) by [`AgentMessage::decode`] — callers
    /// wanting integrity checking call [`AgentMessage::verify_digest`].
    pub payload_digest: [u8; DIGEST_LEN],
    pub payload_type: u32,
    pub payload: Bytes,
}

impl AgentMessage {
    /// Build a frame, computing `payload_digest` from `payload`.
    pub fn new(
        message_type: impl Into<String>,
        schema_version: u32,
        created_date: u64,
        sequence_number: i64,
        flags: u64,
        message_id: Uuid,
        payload_type: u32,
        payload: Bytes,
    ) -> Self {
        let digest = sha256(&payload);
        Self {
            message_type: message_type.into(),
            schema_version,
            created_date,
            sequence_number,
            flags,
            message_id,
            payload_digest: digest,
            payload_type,
            payload,
        }
    }

    /// Encode this frame to its wire representation. `headerLength` is always
    /// written as [`HEADER_LENGTH`] and `payloadDigest` is always recomputed
    /// from `payload` (never trusted from a stale field).
    pub fn encode(&self) -> Result<Bytes, FrameError> {
        let type_bytes = self.message_type.as_bytes();
        if type_bytes.len() > MESSAGE_TYPE_LEN {
            return Err(FrameError::MessageTypeTooLong { len: type_bytes.len() });
        }

        let mut buf = BytesMut::with_capacity(OFFSET_PAYLOAD + self.payload.len());
        buf.put_u32(HEADER_LENGTH);

        let mut type_field = [b' '; MESSAGE_TYPE_LEN];
        type_field[..type_bytes.len()].copy_from_slice(type_bytes);
        buf.put_slice(&type_field);

        buf.put_u32(self.schema_version);
        buf.put_u64(self.created_date);
        buf.put_i64(self.sequence_number);
        buf.put_u64(self.flags);
        buf.put_slice(&encode_message_id(self.message_id));
        buf.put_slice(&sha256(&self.payload));
        buf.put_u32(self.payload_type);
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);

        Ok(buf.freeze())
    }

    /// Decode a frame from its wire representation.
    ///
    /// Rejects frames where `headerLength == 0`, `messageType == ""`, or
    /// `createdDate == 0` (spec §4.5 "validate-on-receive"), and where the
    /// declared `payloadLength` doesn't match the bytes actually present.
    pub fn decode(mut bytes: impl Buf) -> Result<Self, FrameError> {
        let have = bytes.remaining();
        if have < OFFSET_PAYLOAD {
            return Err(FrameError::TooShort { need: OFFSET_PAYLOAD, have });
        }

        let header_length = bytes.get_u32();
        if header_length == 0 {
            return Err(FrameError::ZeroHeaderLength);
        }

        let mut type_field = [0u8; MESSAGE_TYPE_LEN];
        bytes.copy_to_slice(&mut type_field);
        let message_type = String::from_utf8_lossy(&type_field).trim_end().to_owned();
        if message_type.is_empty() {
            return Err(FrameError::EmptyMessageType);
        }

        let schema_version = bytes.get_u32();
        let created_date = bytes.get_u64();
        if created_date == 0 {
            return Err(FrameError::ZeroCreatedDate);
        }
        let sequence_number = bytes.get_i64();
        let flags = bytes.get_u64();

        let mut id_field = [0u8; MESSAGE_ID_LEN];
        bytes.copy_to_slice(&mut id_field);
        let message_id = decode_message_id(id_field);

        let mut digest = [0u8; DIGEST_LEN];
        bytes.copy_to_slice(&mut digest);

        let payload_type = bytes.get_u32();
        let payload_length = bytes.get_u32();

        let remaining = bytes.remaining();
        if remaining != payload_length as usize {
            return Err(FrameError::PayloadLengthMismatch {
                declared: payload_length,
                actual: remaining,
            });
        }
        let payload = bytes.copy_to_bytes(remaining);

        // `_ = header_length` suppresses an unused-binding lint; it's
        // validated above but otherwise not part of the returned struct
        // (it's a derived constant, not state).
        let _ = header_length;

        Ok(Self {
            message_type,
            schema_version,
            created_date,
            sequence_number,
            flags,
            message_id,
            payload_digest: digest,
            payload_type,
            payload,
        })
    }

    /// True if `payload_digest` equals SHA-256 of `payload` — decode doesn't
    /// check this automatically (spec §4.5), so a caller that cares calls
    /// this explicitly.
    pub fn verify_digest(&self) -> bool {
        self.payload_digest == sha256(&self.payload)
    }

    pub fn is_syn(&self) -> bool {
        self.flags & FLAG_SYN != 0
    }

    pub fn is_fin(&self) -> bool {
        self.flags & FLAG_FIN != 0
    }
}

fn sha256(payload: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hasher.finalize().into()
}

/// Encode a UUID into the wire's reversed-half layout: the canonical byte
/// range `[8..16]` (low 64 bits) goes first, then `[0..8]` (high 64 bits).
/// This quirk must be preserved bit-exactly — swapping the halves produces
/// valid-looking but incompatible message IDs.
fn encode_message_id(id: Uuid) -> [u8; MESSAGE_ID_LEN] {
    let canonical = id.into_bytes();
    let mut wire = [0u8; MESSAGE_ID_LEN];
    wire[0..8].copy_from_slice(&canonical[8..16]);
    wire[8..16].copy_from_slice(&canonical[0..8]);
    wire
}

fn decode_message_id(wire: [u8; MESSAGE_ID_LEN]) -> Uuid {
    let mut canonical = [0u8; MESSAGE_ID_LEN];
    canonical[0..8].copy_from_slice(&wire[8..16]);
    canonical[8..16].copy_from_slice(&wire[0..8]);
    Uuid::from_bytes(canonical)
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod frame_tests;
