// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! Durable queue for replies that exhausted retries (component G, §4.7).
//! JSON file on disk, atomic write-tmp-then-rename, keyed by message UUID —
//! same shape as the teacher's `credential::persist` module.

use std::collections::HashMap;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One undelivered reply, framed bytes included so redelivery needs no
/// re-encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedReply {
    #[serde(rename = "messageType")]
    pub message_type: String,
    #[serde(rename = "createdDate")]
    pub created_date: u64,
    /// Base64 of the fully framed `AgentMessage` bytes.
    #[serde(rename = "framedBytes")]
    pub framed_bytes: String,
    pub attempts: u32,
}

impl PersistedReply {
    pub fn new(message_type: impl Into<String>, created_date: u64, framed: &[u8], attempts: u32) -> Self {
        Self { message_type: message_type.into(), created_date, framed_bytes: BASE64.encode(framed), attempts }
    }

    pub fn framed_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64.decode(&self.framed_bytes)
    }
}

/// The full on-disk queue, keyed by message UUID.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PersistedQueue {
    pub replies: HashMap<Uuid, PersistedReply>,
}

impl PersistedQueue {
    pub fn insert(&mut self, id: Uuid, reply: PersistedReply) {
        self.replies.insert(id, reply);
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<PersistedReply> {
        self.replies.remove(id)
    }
}

/// Load the queue from `path`. A missing file is treated as an empty queue
/// (nothing has been persisted yet) rather than an error.
pub fn load(path: &Path) -> anyhow::Result<PersistedQueue> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(serde_json::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedQueue::default()),
        Err(e) => Err(e.into()),
    }
}

/// Save the queue to `path` atomically (write tmp + rename), so a crash
/// mid-write never leaves a corrupt/partial queue file behind.
pub fn save(path: &Path, queue: &PersistedQueue) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(queue)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
