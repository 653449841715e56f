// SPDX-License-Identifier: BUSL-1.1
// Copyright 2026 Alfred Jean LLC

//! On-disk session transcript (§4.9 expansion): every pty output chunk is
//! appended to a file and mirrored into a [`RingBuffer`] so a reconnecting
//! control plane can replay from a byte offset without re-reading the whole
//! file. Grounded on the teacher's numbered-snapshot transcript module,
//! simplified from "periodic JSONL snapshot" to "append-only byte stream"
//! since a pty session has no natural snapshot boundary.

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::ring::RingBuffer;

pub struct SessionTranscript {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
    ring: Mutex<RingBuffer>,
}

impl SessionTranscript {
    pub async fn create(path: impl Into<PathBuf>, ring_capacity: usize) -> std::io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path).await?;
        Ok(Self { path, file: Mutex::new(file), ring: Mutex::new(RingBuffer::new(ring_capacity)) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a chunk of pty output, both to disk and to the in-memory ring.
    pub async fn append(&self, data: &[u8]) -> std::io::Result<()> {
        self.file.lock().await.write_all(data).await?;
        self.ring.lock().await.write(data);
        Ok(())
    }

    /// Replay from `offset`. Falls back to reading the on-disk file when the
    /// ring buffer has already discarded the requested range.
    pub async fn read_from(&self, offset: u64) -> std::io::Result<Vec<u8>> {
        if let Some((a, b)) = self.ring.lock().await.read_from(offset) {
            let mut out = a.to_vec();
            out.extend_from_slice(b);
            return Ok(out);
        }
        let contents = tokio::fs::read(&self.path).await?;
        Ok(contents.into_iter().skip(offset as usize).collect())
    }

    pub async fn total_written(&self) -> u64 {
        self.ring.lock().await.total_written()
    }
}

#[cfg(test)]
#[path = "transcript_tests.rs"]
mod tests;
